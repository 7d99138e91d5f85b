use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use lead_ripple::config::load_config;
///
/// let config = load_config(Path::new("enrich.toml")).unwrap();
/// println!("Workers: {}", config.enrich.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is reported in the status file so a dashboard can tell which
/// configuration produced a run.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
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

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config_content = r#"
[io]
input-path = "breweries.csv"
output-path = "enriched.csv"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.enrich.max_fetches_per_record, 8);
        assert_eq!(config.enrich.record_deadline_secs, 75);
        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.cooldown_secs, 1800);
        assert_eq!(config.fetcher.max_body_bytes, 1_500_000);
        assert_eq!(config.io.status_path, "enrich_stats.json");
        assert_eq!(config.email_policy.max_emails, 3);
    }

    #[test]
    fn test_load_full_config() {
        let config_content = r#"
[enrich]
max-fetches-per-record = 4
record-deadline-secs = 30
hard-timeout-margin-secs = 2
throttle-ms = 0
workers = 3
isolation = false

[fetcher]
connect-timeout-secs = 2
request-timeout-secs = 5
max-body-bytes = 65536
max-retries = 1
retry-backoff-ms = 100
max-redirects = 3

[breaker]
failure-threshold = 3
cooldown-secs = 60

[user-agent]
crawler-name = "TestBot"
crawler-version = "0.9"
contact-url = "https://example.com/bot"

[io]
input-path = "in.csv"
output-path = "out.csv"
status-path = "status.json"

[email-policy]
role-prefixes = ["info", "team"]
free-domains = ["freemail.com"]
max-emails = 2
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.enrich.workers, 3);
        assert!(!config.enrich.isolation);
        assert_eq!(config.fetcher.max_redirects, 3);
        assert_eq!(config.breaker.cooldown_secs, 60);
        assert_eq!(config.user_agent.crawler_name, "TestBot");
        assert_eq!(config.email_policy.role_prefixes, vec!["info", "team"]);
        assert_eq!(config.enrich.hard_timeout().as_secs(), 32);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/enrich.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_io_section_is_rejected() {
        let result = parse_config("[enrich]\nworkers = 2\n");
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[enrich]
workers = 0

[io]
input-path = "in.csv"
output-path = "out.csv"
"#;

        let result = parse_config(config_content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_hard_timeout_margin_is_rejected() {
        let config_content = r#"
[enrich]
hard-timeout-margin-secs = 0

[io]
input-path = "in.csv"
output-path = "out.csv"
"#;

        let result = parse_config(config_content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
