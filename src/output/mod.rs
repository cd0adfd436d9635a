//! Output module for reporting crawl results
//!
//! This module handles:
//! - Per-user progress and found-profile statistics
//! - Markdown export of found profiles

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary, UserExport};
pub use stats::{load_statistics, print_statistics, UserStatistics};

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while producing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
