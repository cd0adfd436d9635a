//! Configuration module for Profile-Sieve
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The `[[search]]` blocks double as the settings provider consumed by the crawler.
//!
//! # Example
//!
//! ```no_run
//! use profile_sieve::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sieve.toml")).unwrap();
//! println!("Configured credentials: {}", config.credentials.usable_tokens().len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, CredentialsConfig, DelayConfig, DelayRange, OutputConfig, PoolConfig,
    SearchSettings,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

/// Source of per-user search settings
pub trait SettingsProvider: Send + Sync {
    /// Returns the settings for `user`, or `None` if the user has none
    fn get_settings(&self, user: &str) -> Option<SearchSettings>;
}

impl SettingsProvider for Config {
    fn get_settings(&self, user: &str) -> Option<SearchSettings> {
        self.searches.iter().find(|s| s.user == user).cloned()
    }
}

impl Config {
    /// Names of every user with a `[[search]]` block, in file order
    pub fn users(&self) -> Vec<String> {
        self.searches.iter().map(|s| s.user.clone()).collect()
    }
}
