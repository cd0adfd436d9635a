//! Credential pool for rotating API tokens
//!
//! The pool hands out the healthiest, least-used credential on every call,
//! rests credentials that keep failing, and enforces a pool-wide pause after
//! a flood-control response. All bookkeeping sits behind a single mutex so
//! concurrent crawl tasks observe `select` and `report_error` atomically.

mod credential;

pub use credential::CredentialRecord;

use crate::api::ErrorCode;
use crate::config::PoolConfig;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// A credential borrowed for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialLease {
    pub id: usize,
    pub token: String,
}

/// Usage counters of one credential, without its token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub id: usize,
    pub requests_count: u64,
    pub error_count: u32,
}

struct PoolState {
    records: Vec<CredentialRecord>,
    flood_until: Option<Instant>,
}

/// Outcome of a non-blocking selection attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Selection {
    Leased(CredentialLease),
    /// The flood gate is active for this much longer
    Gated(Duration),
    Empty,
}

/// Thread-safe pool of API credentials
pub struct CredentialPool {
    state: Mutex<PoolState>,
    policy: PoolConfig,
}

impl CredentialPool {
    /// Creates a pool from configured tokens; blank tokens are ignored
    pub fn new(tokens: Vec<String>, policy: PoolConfig) -> Self {
        let records = tokens
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .enumerate()
            .map(|(id, token)| CredentialRecord::new(id, token))
            .collect::<Vec<_>>();

        tracing::info!("Credential pool initialized with {} credentials", records.len());

        Self {
            state: Mutex::new(PoolState {
                records,
                flood_until: None,
            }),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of configured credentials
    pub fn health_count(&self) -> usize {
        self.lock().records.len()
    }

    /// Borrows the next credential, waiting out an active flood gate first
    ///
    /// Returns `None` only when the pool has no credentials at all.
    pub async fn select(&self) -> Option<CredentialLease> {
        loop {
            match self.try_select() {
                Selection::Leased(lease) => return Some(lease),
                Selection::Empty => return None,
                Selection::Gated(wait) => {
                    tracing::warn!(
                        "Global flood control active, waiting {:.1}s",
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Selects a credential without waiting
    pub fn try_select(&self) -> Selection {
        let mut state = self.lock();
        if state.records.is_empty() {
            return Selection::Empty;
        }

        let now = Instant::now();
        if let Some(until) = state.flood_until {
            if now < until {
                return Selection::Gated(until - now);
            }
            state.flood_until = None;
            tracing::info!("Global flood control lifted");
        }

        let threshold = self.policy.error_threshold;
        let window = self.policy.error_window();

        let any_available = state
            .records
            .iter()
            .any(|r| r.is_available(threshold, window, now));

        if !any_available {
            // Escape valve: forward progress wins over the health signal
            tracing::warn!("All credentials are resting, resetting error counters");
            for record in state.records.iter_mut() {
                record.error_count = 0;
            }
        }

        let selected = state
            .records
            .iter_mut()
            .filter(|r| r.is_available(threshold, window, now))
            .min_by(|a, b| a.selection_cmp(b));

        match selected {
            Some(record) => {
                record.record_use(now);
                tracing::debug!(
                    credential = record.id,
                    requests = record.requests_count,
                    errors = record.error_count,
                    "Selected credential"
                );
                Selection::Leased(CredentialLease {
                    id: record.id,
                    token: record.token.clone(),
                })
            }
            None => Selection::Empty,
        }
    }

    /// Reports a failed call made with credential `id`
    ///
    /// A flood-control code also arms the pool-wide gate.
    pub fn report_error(&self, id: usize, code: Option<ErrorCode>) {
        let mut state = self.lock();
        let now = Instant::now();

        match state.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.record_error(now);
                tracing::warn!(
                    credential = id,
                    errors = record.error_count,
                    code = code.map(|c| c.0),
                    "Credential reported an error"
                );
            }
            None => {
                tracing::warn!(credential = id, "Error reported for unknown credential");
                return;
            }
        }

        if code.is_some_and(|c| c.is_flood()) {
            let until = now + self.policy.flood_cooldown();
            state.flood_until = Some(match state.flood_until {
                Some(existing) if existing > until => existing,
                _ => until,
            });
            tracing::error!(
                "Flood control detected, pausing all credentials for {}s",
                self.policy.flood_cooldown_secs
            );
        }
    }

    /// Time left on the flood gate, if it is active
    pub fn flood_gate_remaining(&self) -> Option<Duration> {
        let state = self.lock();
        let now = Instant::now();
        state
            .flood_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Usage counters for every credential
    pub fn snapshot(&self) -> Vec<CredentialSnapshot> {
        self.lock()
            .records
            .iter()
            .map(|r| CredentialSnapshot {
                id: r.id,
                requests_count: r.requests_count,
                error_count: r.error_count,
            })
            .collect()
    }
}
