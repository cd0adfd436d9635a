use std::cmp::Ordering;
use tokio::time::Instant;

/// Health and usage of one API credential
///
/// Owned by the pool; records are never removed, only rested.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    /// Position in the configured token list
    pub id: usize,

    pub(crate) token: String,

    /// Requests issued through this credential
    pub requests_count: u64,

    /// Errors reported against this credential since the last global reset
    pub error_count: u32,

    /// When this credential was last handed out
    pub last_used_at: Option<Instant>,

    /// When an error was last reported against this credential
    pub last_error_at: Option<Instant>,
}

impl CredentialRecord {
    pub fn new(id: usize, token: String) -> Self {
        Self {
            id,
            token,
            requests_count: 0,
            error_count: 0,
            last_used_at: None,
            last_error_at: None,
        }
    }

    /// Whether this credential may be handed out at `now`
    ///
    /// A credential at or above `threshold` errors is rested until `window`
    /// has passed since its last error.
    pub fn is_available(&self, threshold: u32, window: std::time::Duration, now: Instant) -> bool {
        if self.error_count < threshold {
            return true;
        }
        match self.last_error_at {
            Some(at) => now.saturating_duration_since(at) >= window,
            None => true,
        }
    }

    /// Selection order: fewest errors, then fewest requests, then least recently used
    ///
    /// A never-used credential sorts before any used one; full ties fall back
    /// to configuration order so selection is deterministic.
    pub fn selection_cmp(&self, other: &Self) -> Ordering {
        self.error_count
            .cmp(&other.error_count)
            .then_with(|| self.requests_count.cmp(&other.requests_count))
            .then_with(|| self.last_used_at.cmp(&other.last_used_at))
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn record_use(&mut self, now: Instant) {
        self.requests_count += 1;
        self.last_used_at = Some(now);
    }

    pub fn record_error(&mut self, now: Instant) {
        self.error_count += 1;
        self.last_error_at = Some(now);
    }
}
