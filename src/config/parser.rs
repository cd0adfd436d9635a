use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Reads, parses and validates the TOML file at `path`
///
/// ```no_run
/// use std::path::Path;
/// use profile_sieve::config::load_config;
///
/// let config = load_config(Path::new("sieve.toml")).unwrap();
/// println!("{} searches configured", config.searches.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Hex SHA-256 of the configuration text
///
/// Logged at startup so a resumed crawl can be matched to the file it ran with.
pub fn compute_config_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads a configuration together with the hash of the text it was parsed from
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, compute_config_hash(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[api]
base-url = "https://api.example.com"
min-population = 40

[credentials]
tokens = ["token-a", "token-b", ""]

[delays]
request = [100, 200]
between-ages = 500

[output]
database-path = "./test.db"
summary-path = "./found.md"

[[search]]
user = "alice"
cities = ["Springfield", "Shelbyville"]
keywords = ["chess", "Go"]
age-from = 18
age-to = 25
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.page_size, 50);
        assert_eq!(config.api.max_pagination_depth, 1000);
        assert_eq!(config.api.max_offset, 500);
        assert_eq!(config.api.min_population, 40);
        assert_eq!(config.credentials.usable_tokens().len(), 2);
        assert_eq!(config.pool.error_threshold, 3);
        assert_eq!(config.delays.request.min_ms, 100);
        assert_eq!(config.delays.request.max_ms, 200);
        assert_eq!(config.delays.between_ages.min_ms, 500);
        assert_eq!(config.delays.between_ages.max_ms, 500);
        assert_eq!(config.searches.len(), 1);
        assert_eq!(config.searches[0].age_from, 18);
        assert!(!config.searches[0].check_recent_activity);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_config(Path::new("/nonexistent/sieve.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_parse_rejects_invalid_toml() {
        assert!(matches!(
            parse_config("[[search]\nuser = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_profile_url_prefix_default() {
        let config = parse_config(VALID_CONFIG).unwrap();
        assert_eq!(config.api.profile_url_prefix, "https://vk.com/id");
        assert_eq!(config.api.default_country_id, 1);
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("age-to = 25", "age-to = 95");
        assert!(matches!(parse_config(&content), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_config_without_tokens_fails() {
        let content = VALID_CONFIG.replace(r#"["token-a", "token-b", ""]"#, r#"["  "]"#);
        assert!(matches!(parse_config(&content), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_hash_tracks_content() {
        let a = compute_config_hash(VALID_CONFIG);
        assert_eq!(a, compute_config_hash(VALID_CONFIG));
        assert_eq!(a.len(), 64);
        assert_ne!(a, compute_config_hash(&VALID_CONFIG.replace("alice", "bob")));
    }

    #[test]
    fn test_load_with_hash_matches_file_text() {
        let file = create_temp_config(VALID_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.users(), vec!["alice".to_string()]);
        assert_eq!(hash, compute_config_hash(VALID_CONFIG));
    }
}
