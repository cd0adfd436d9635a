//! Storage module for persisting crawl data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Per-user crawl cursors for stop and resume
//! - Cancellation flags
//! - Found profiles, recorded once per user

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{FoundRecord, SqliteStorage};
pub use traits::{ProgressStore, ResultSink, SearchControl, StorageError, StorageResult};

use crate::api::CandidateProfile;
use crate::matcher::MatchHit;
use crate::state::GenderStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, StorageError> {
    SqliteStorage::new(path)
}

/// A matched profile as delivered to the result sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundProfile {
    pub profile_id: i64,
    pub name: String,
    pub profile_url: String,
    pub photo_url: Option<String>,
    pub bdate: Option<String>,
    /// City name as given in the search request
    pub city: String,
    pub place_id: i64,
    pub age: u8,
    pub strategy: GenderStrategy,
    pub hits: Vec<MatchHit>,
}

impl FoundProfile {
    pub fn from_candidate(
        candidate: &CandidateProfile,
        hits: Vec<MatchHit>,
        profile_url_prefix: &str,
        city: &str,
        place_id: i64,
        age: u8,
        strategy: GenderStrategy,
    ) -> Self {
        Self {
            profile_id: candidate.id,
            name: candidate.display_name(),
            profile_url: format!("{}{}", profile_url_prefix, candidate.id),
            photo_url: candidate.photo_url().map(str::to_string),
            bdate: candidate.bdate.clone(),
            city: city.to_string(),
            place_id,
            age,
            strategy,
            hits,
        }
    }

    /// Distinct keywords that matched, in first-hit order
    pub fn keywords(&self) -> Vec<&str> {
        let mut keywords: Vec<&str> = Vec::new();
        for hit in &self.hits {
            if !keywords.contains(&hit.keyword.as_str()) {
                keywords.push(&hit.keyword);
            }
        }
        keywords
    }
}
