//! Remote profile directory access
//!
//! The crawler depends only on the [`Directory`] trait; [`DirectoryClient`]
//! is the HTTP implementation backed by the credential pool.

mod client;
mod types;

pub use client::{build_http_client, DirectoryClient};
pub use types::{
    compute_has_more, CandidateProfile, ClientError, ErrorCode, PageQuery, PageResult, PlaceRef,
};

use async_trait::async_trait;

/// Operations the crawler needs from the profile directory
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolves a place name to its directory id
    ///
    /// Tries the default region first and then an unrestricted search.
    /// `Ok(None)` means the place does not exist.
    async fn resolve_place(&self, name: &str) -> Result<Option<i64>, ClientError>;

    /// Fetches one page of profiles for a place, age and strategy
    async fn search_page(&self, query: &PageQuery) -> Result<PageResult, ClientError>;

    /// Returns the most recent activity texts of a profile
    ///
    /// Failures are swallowed and yield an empty list.
    async fn fetch_recent_activity(&self, profile_id: i64) -> Vec<String>;
}
