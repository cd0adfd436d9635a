//! Wire types and outcome classification for the directory API

use crate::state::GenderStrategy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric error code returned by the directory API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i64);

impl ErrorCode {
    /// Too many requests per second
    pub const TOO_MANY_REQUESTS: ErrorCode = ErrorCode(6);

    /// Flood control: the service is rejecting this account cluster for a while
    pub const FLOOD_CONTROL: ErrorCode = ErrorCode(9);

    /// Per-method quota reached for this credential
    pub const RATE_LIMIT_REACHED: ErrorCode = ErrorCode(29);

    /// Whether retrying with another credential can succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            *self,
            Self::TOO_MANY_REQUESTS | Self::FLOOD_CONTROL | Self::RATE_LIMIT_REACHED
        )
    }

    /// Whether this code arms the pool-wide flood gate
    pub fn is_flood(&self) -> bool {
        *self == Self::FLOOD_CONTROL
    }
}

/// Errors surfaced by the directory client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No API credentials available")]
    NoCredentials,

    #[error("API error {code} in {method}: {message}")]
    Api {
        method: String,
        code: i64,
        message: String,
    },

    #[error("HTTP {status} from {method}")]
    Http { method: String, status: u16 },

    #[error("Transport failure in {method}: {source}")]
    Transport {
        method: String,
        source: reqwest::Error,
    },

    #[error("Malformed response from {method}: {message}")]
    Malformed { method: String, message: String },

    #[error("Gave up on {method} after {attempts} rate-limited attempts")]
    RetriesExhausted { method: String, attempts: usize },
}

/// Error object of a failed API call
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}

/// A list response: `{ "count": n, "items": [...] }`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ItemList<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlaceItem {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ActivityItem {
    #[serde(default)]
    pub text: String,
}

/// Place reference embedded in a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRef {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

/// One profile returned by a search page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub city: Option<PlaceRef>,
    #[serde(default)]
    pub photo_200: Option<String>,
    #[serde(default)]
    pub photo_max_orig: Option<String>,
    #[serde(default)]
    pub bdate: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub activities: Option<String>,
    #[serde(default)]
    pub interests: Option<String>,
    #[serde(default)]
    pub music: Option<String>,
    #[serde(default)]
    pub movies: Option<String>,
    #[serde(default)]
    pub tv: Option<String>,
    #[serde(default)]
    pub books: Option<String>,
    #[serde(default)]
    pub games: Option<String>,
    #[serde(default)]
    pub quotes: Option<String>,
}

impl CandidateProfile {
    /// Field projection requested from the search endpoint
    pub const FIELDS: &'static str = "city,country,about,activities,interests,music,movies,tv,books,games,quotes,status,photo_200,photo_max_orig,bdate";

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Best available avatar URL
    pub fn photo_url(&self) -> Option<&str> {
        [&self.photo_max_orig, &self.photo_200]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|url| !url.is_empty())
    }

    pub fn has_avatar(&self) -> bool {
        self.photo_url().is_some()
    }

    /// Text fields scanned for keywords, in presentation order
    pub fn text_fields(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("status", self.status.as_deref()),
            ("about", self.about.as_deref()),
            ("activities", self.activities.as_deref()),
            ("interests", self.interests.as_deref()),
            ("music", self.music.as_deref()),
            ("movies", self.movies.as_deref()),
            ("tv", self.tv.as_deref()),
            ("books", self.books.as_deref()),
            ("games", self.games.as_deref()),
            ("quotes", self.quotes.as_deref()),
        ]
    }
}

/// Parameters of one search page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub place_id: i64,
    pub age: u8,
    pub strategy: GenderStrategy,
    pub offset: u32,
    pub page_size: u32,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// Population the directory reports for the query
    pub total_count: u64,
    pub items: Vec<CandidateProfile>,
    pub has_more: bool,
    /// Population below the configured minimum; do not paginate
    pub min_population_rejected: bool,
}

/// Whether more pages can be requested after this one
///
/// False when the page was empty, or once `offset + returned` reaches
/// `min(total_count, depth_cap)`.
pub fn compute_has_more(offset: u32, returned: usize, total_count: u64, depth_cap: u32) -> bool {
    if returned == 0 {
        return false;
    }
    let processed = offset as u64 + returned as u64;
    processed < total_count && processed < depth_cap as u64
}
