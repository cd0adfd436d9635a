//! Collaborator traits and error types
//!
//! The crawler talks to persistence only through these three traits, so a
//! run can be driven against SQLite in production and in-memory fakes in
//! tests. All methods take `&self`; implementations synchronize internally.

use crate::state::CrawlProgress;
use crate::storage::FoundProfile;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record for user '{user}': {message}")]
    Corrupt { user: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persists the resumable cursor of each user's crawl
pub trait ProgressStore: Send + Sync {
    fn load_progress(&self, user: &str) -> StorageResult<Option<CrawlProgress>>;

    /// Replaces the stored cursor for `user`
    fn save_progress(&self, user: &str, progress: &CrawlProgress) -> StorageResult<()>;

    fn clear_progress(&self, user: &str) -> StorageResult<()>;
}

/// Receives matched profiles
pub trait ResultSink: Send + Sync {
    /// Records a found profile
    ///
    /// Delivery is at-least-once. Returns `false` when the profile was
    /// already recorded for this user, in which case nothing changes.
    fn on_found(&self, user: &str, found: &FoundProfile) -> StorageResult<bool>;
}

/// External cancellation flag, polled by the crawler
pub trait SearchControl: Send + Sync {
    fn is_still_searching(&self, user: &str) -> StorageResult<bool>;

    fn set_searching(&self, user: &str, searching: bool) -> StorageResult<()>;
}
