//! Crawler module for walking the directory
//!
//! This module contains the core crawling logic, including:
//! - The per-user state machine over city × strategy × age cells
//! - Pacing between requests, pages and dimension boundaries
//! - Cooperative cancellation and resume from the persisted cursor
//! - The single-run-per-user guard

mod coordinator;
mod runner;

pub use coordinator::Crawler;

use crate::config::{Config, DelayConfig};

/// Knobs of the state machine, taken from the configuration
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Profiles requested per page
    pub page_size: u32,

    /// Offset at which a cell is considered exhausted
    pub max_offset: u32,

    /// Prefix joined with a profile id to build its public URL
    pub profile_url_prefix: String,

    pub delays: DelayConfig,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.api.page_size,
            max_offset: config.api.max_offset,
            profile_url_prefix: config.api.profile_url_prefix.clone(),
            delays: config.delays.clone(),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every cell reached a terminal state
    Completed,
    /// The searching flag was cleared; the cursor is kept for resume
    Cancelled,
}

/// Counters of one `run_crawl` call
///
/// Results themselves only flow through the result sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub user: String,
    pub outcome: RunOutcome,
    /// Whether the run continued a persisted cursor
    pub resumed: bool,
    pub pages_fetched: u64,
    pub profiles_checked: u64,
    /// Profiles newly recorded by the sink during this run
    pub profiles_found: u64,
}

impl RunSummary {
    pub(crate) fn new(user: &str, resumed: bool) -> Self {
        Self {
            user: user.to_string(),
            outcome: RunOutcome::Cancelled,
            resumed,
            pages_fetched: 0,
            profiles_checked: 0,
            profiles_found: 0,
        }
    }
}
