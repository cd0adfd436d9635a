use crate::config::types::{ApiConfig, Config, DelayConfig, OutputConfig, PoolConfig, SearchSettings};
use crate::state::SearchRequest;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_credentials(&config.credentials.usable_tokens())?;
    validate_pool_config(&config.pool)?;
    validate_delay_config(&config.delays)?;
    validate_output_config(&config.output)?;
    validate_searches(&config.searches)?;
    Ok(())
}

/// Validates the remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api version cannot be empty".to_string(),
        ));
    }

    if config.page_size < 1 || config.page_size > 50 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 50, got {}",
            config.page_size
        )));
    }

    if config.max_pagination_depth < 1 {
        return Err(ConfigError::Validation(
            "max-pagination-depth must be >= 1".to_string(),
        ));
    }

    if config.max_offset < 1 || config.max_offset > config.max_pagination_depth {
        return Err(ConfigError::Validation(format!(
            "max-offset must be between 1 and max-pagination-depth ({}), got {}",
            config.max_pagination_depth, config.max_offset
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Crawling must never start without at least one credential
fn validate_credentials(tokens: &[String]) -> Result<(), ConfigError> {
    if tokens.is_empty() {
        return Err(ConfigError::Validation(
            "at least one non-empty credential token is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_pool_config(config: &PoolConfig) -> Result<(), ConfigError> {
    if config.error_threshold < 1 {
        return Err(ConfigError::Validation(
            "error-threshold must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_delay_config(config: &DelayConfig) -> Result<(), ConfigError> {
    for (name, range) in config.ranges() {
        if range.min_ms > range.max_ms {
            return Err(ConfigError::Validation(format!(
                "delay '{}' has min {}ms greater than max {}ms",
                name, range.min_ms, range.max_ms
            )));
        }
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates every `[[search]]` block as a search request
fn validate_searches(searches: &[SearchSettings]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for settings in searches {
        if settings.user.trim().is_empty() {
            return Err(ConfigError::Validation(
                "search user cannot be empty".to_string(),
            ));
        }

        if !seen.insert(settings.user.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate search block for user '{}'",
                settings.user
            )));
        }

        SearchRequest::from_settings(settings).map_err(|e| {
            ConfigError::Validation(format!("search for '{}': {}", settings.user, e))
        })?;
    }

    Ok(())
}
