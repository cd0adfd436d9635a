//! Profile-Sieve: a resumable, credential-rotating directory crawler
//!
//! This crate walks a paginated, rate-limited profile directory across
//! city × gender strategy × age, matches profile text against a keyword set,
//! and rotates between several API credentials so that no single one is
//! throttled into uselessness. Progress is persisted after every page so a
//! multi-hour crawl can be stopped and resumed without re-scanning pages.

pub mod api;
pub mod config;
pub mod crawler;
pub mod matcher;
pub mod output;
pub mod pool;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Profile-Sieve operations
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid search request: {0}")]
    Request(#[from] RequestError),

    #[error("Directory client error: {0}")]
    Client(#[from] api::ClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No usable API credentials configured")]
    NoCredentials,

    #[error("No search settings configured for user '{0}'")]
    UnknownUser(String),

    #[error("A crawl for user '{0}' is already running")]
    AlreadyRunning(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised when a search request violates its invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("At least one city is required")]
    NoCities,

    #[error("At least one keyword is required")]
    NoKeywords,

    #[error("age_from must be >= {min}, got {got}")]
    AgeTooLow { min: u8, got: u8 },

    #[error("age_to must be <= {max}, got {got}")]
    AgeTooHigh { max: u8, got: u8 },

    #[error("age_from ({from}) must not exceed age_to ({to})")]
    AgeRangeInverted { from: u8, to: u8 },
}

/// Result type alias for Profile-Sieve operations
pub type Result<T> = std::result::Result<T, SieveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use api::DirectoryClient;
pub use config::Config;
pub use crawler::{Crawler, RunOutcome, RunSummary};
pub use pool::CredentialPool;
pub use state::{CellState, CrawlProgress, GenderStrategy, SearchRequest};
