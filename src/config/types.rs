use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Profile-Sieve
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub delays: DelayConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "search")]
    pub searches: Vec<SearchSettings>,
}

/// Remote directory API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the directory API (method calls go to `{base-url}/method/{name}`)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// API version sent with every call
    #[serde(default = "default_api_version")]
    pub version: String,

    /// Region tried first when resolving a place name
    #[serde(rename = "default-country-id", default = "default_country_id")]
    pub default_country_id: i64,

    /// Profiles requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Absolute pagination depth the API will serve
    #[serde(
        rename = "max-pagination-depth",
        default = "default_max_pagination_depth"
    )]
    pub max_pagination_depth: u32,

    /// Offset at which an age cell is considered exhausted
    #[serde(rename = "max-offset", default = "default_max_offset")]
    pub max_offset: u32,

    /// Places whose population is reported below this are skipped
    #[serde(rename = "min-population", default = "default_min_population")]
    pub min_population: u64,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Prefix joined with a profile id to build its public URL
    #[serde(rename = "profile-url-prefix", default = "default_profile_url_prefix")]
    pub profile_url_prefix: String,
}

/// API credentials
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl CredentialsConfig {
    /// Returns the configured tokens with blank entries removed
    pub fn usable_tokens(&self) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Credential pool health policy
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Error count at which a credential is rested
    #[serde(rename = "error-threshold", default = "default_error_threshold")]
    pub error_threshold: u32,

    /// How long a rested credential stays out of rotation (seconds)
    #[serde(rename = "error-window-secs", default = "default_error_window")]
    pub error_window_secs: u64,

    /// Pool-wide pause after a flood-control response (seconds)
    #[serde(rename = "flood-cooldown-secs", default = "default_flood_cooldown")]
    pub flood_cooldown_secs: u64,
}

impl PoolConfig {
    pub fn error_window(&self) -> Duration {
        Duration::from_secs(self.error_window_secs)
    }

    pub fn flood_cooldown(&self) -> Duration {
        Duration::from_secs(self.flood_cooldown_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            error_threshold: default_error_threshold(),
            error_window_secs: default_error_window(),
            flood_cooldown_secs: default_flood_cooldown(),
        }
    }
}

/// A delay in milliseconds, either fixed or sampled uniformly from `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "DelaySpec")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DelaySpec {
    Fixed(u64),
    Range([u64; 2]),
}

impl From<DelaySpec> for DelayRange {
    fn from(spec: DelaySpec) -> Self {
        match spec {
            DelaySpec::Fixed(ms) => Self::fixed(ms),
            DelaySpec::Range([min_ms, max_ms]) => Self::between(min_ms, max_ms),
        }
    }
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min_ms: 0,
        max_ms: 0,
    };

    pub fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub fn between(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    /// Picks a duration uniformly from the range
    pub fn sample(&self) -> Duration {
        if self.min_ms >= self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    /// Sleeps for a sampled duration
    pub async fn wait(&self) {
        if self.is_zero() {
            return;
        }
        tokio::time::sleep(self.sample()).await;
    }
}

/// Pacing between calls, all values in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct DelayConfig {
    /// Before every search page request
    #[serde(default = "default_request_delay")]
    pub request: DelayRange,

    /// Before every recent-activity fetch
    #[serde(rename = "recent-activity", default = "default_activity_delay")]
    pub recent_activity: DelayRange,

    /// After every found profile is delivered
    #[serde(rename = "found-profile", default = "default_found_delay")]
    pub found_profile: DelayRange,

    /// Between consecutive pages of one age cell
    #[serde(rename = "between-pages", default = "default_page_delay")]
    pub between_pages: DelayRange,

    #[serde(rename = "between-ages", default = "default_age_delay")]
    pub between_ages: DelayRange,

    #[serde(rename = "between-strategies", default = "default_strategy_delay")]
    pub between_strategies: DelayRange,

    #[serde(rename = "between-cities", default = "default_city_delay")]
    pub between_cities: DelayRange,

    /// Sleep before retrying a rate-limited call with another credential
    #[serde(rename = "rate-limit-cooldown", default = "default_rate_limit_cooldown")]
    pub rate_limit_cooldown: DelayRange,
}

impl DelayConfig {
    /// No pacing at all; useful for tests and dry runs
    pub fn none() -> Self {
        Self {
            request: DelayRange::ZERO,
            recent_activity: DelayRange::ZERO,
            found_profile: DelayRange::ZERO,
            between_pages: DelayRange::ZERO,
            between_ages: DelayRange::ZERO,
            between_strategies: DelayRange::ZERO,
            between_cities: DelayRange::ZERO,
            rate_limit_cooldown: DelayRange::ZERO,
        }
    }

    pub(crate) fn ranges(&self) -> [(&'static str, DelayRange); 8] {
        [
            ("request", self.request),
            ("recent-activity", self.recent_activity),
            ("found-profile", self.found_profile),
            ("between-pages", self.between_pages),
            ("between-ages", self.between_ages),
            ("between-strategies", self.between_strategies),
            ("between-cities", self.between_cities),
            ("rate-limit-cooldown", self.rate_limit_cooldown),
        ]
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            request: default_request_delay(),
            recent_activity: default_activity_delay(),
            found_profile: default_found_delay(),
            between_pages: default_page_delay(),
            between_ages: default_age_delay(),
            between_strategies: default_strategy_delay(),
            between_cities: default_city_delay(),
            rate_limit_cooldown: default_rate_limit_cooldown(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown export of found profiles
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// Search settings for one end user
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchSettings {
    pub user: String,

    pub cities: Vec<String>,

    pub keywords: Vec<String>,

    #[serde(rename = "age-from", default = "default_age_from")]
    pub age_from: u8,

    #[serde(rename = "age-to", default = "default_age_to")]
    pub age_to: u8,

    #[serde(rename = "check-recent-activity", default)]
    pub check_recent_activity: bool,
}

fn default_api_version() -> String {
    "5.131".to_string()
}

fn default_country_id() -> i64 {
    1
}

fn default_page_size() -> u32 {
    50
}

fn default_max_pagination_depth() -> u32 {
    1000
}

fn default_max_offset() -> u32 {
    500
}

fn default_min_population() -> u64 {
    50
}

fn default_request_timeout() -> u64 {
    30
}

fn default_profile_url_prefix() -> String {
    "https://vk.com/id".to_string()
}

fn default_error_threshold() -> u32 {
    3
}

fn default_error_window() -> u64 {
    300
}

fn default_flood_cooldown() -> u64 {
    300
}

fn default_request_delay() -> DelayRange {
    DelayRange::between(5_000, 8_000)
}

fn default_activity_delay() -> DelayRange {
    DelayRange::between(3_000, 6_000)
}

fn default_found_delay() -> DelayRange {
    DelayRange::between(2_000, 5_000)
}

fn default_page_delay() -> DelayRange {
    DelayRange::between(5_000, 10_000)
}

fn default_age_delay() -> DelayRange {
    DelayRange::fixed(5_000)
}

fn default_strategy_delay() -> DelayRange {
    DelayRange::fixed(10_000)
}

fn default_city_delay() -> DelayRange {
    DelayRange::fixed(20_000)
}

fn default_rate_limit_cooldown() -> DelayRange {
    DelayRange::fixed(15_000)
}

fn default_age_from() -> u8 {
    14
}

fn default_age_to() -> u8 {
    35
}
