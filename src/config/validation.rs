use crate::config::types::{
    BreakerConfig, Config, EmailPolicy, EnrichConfig, FetcherConfig, IoConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_enrich_config(&config.enrich)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_breaker_config(&config.breaker)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_io_config(&config.io)?;
    validate_email_policy(&config.email_policy)?;
    Ok(())
}

/// Validates per-record pipeline limits
fn validate_enrich_config(config: &EnrichConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.record_deadline_secs < 1 {
        return Err(ConfigError::Validation(
            "record_deadline_secs must be >= 1".to_string(),
        ));
    }

    // The hard timeout must stay strictly above the cooperative deadline.
    if config.hard_timeout_margin_secs < 1 {
        return Err(ConfigError::Validation(
            "hard_timeout_margin_secs must be >= 1".to_string(),
        ));
    }

    // A zero fetch budget is allowed: records are then only normalized.
    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_body_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_body_bytes must be >= 1024, got {}",
            config.max_body_bytes
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates circuit breaker configuration
fn validate_breaker_config(config: &BreakerConfig) -> Result<(), ConfigError> {
    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "failure_threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates input/output paths
fn validate_io_config(config: &IoConfig) -> Result<(), ConfigError> {
    if config.input_path.is_empty() {
        return Err(ConfigError::Validation(
            "input_path cannot be empty".to_string(),
        ));
    }

    if config.output_path.is_empty() {
        return Err(ConfigError::Validation(
            "output_path cannot be empty".to_string(),
        ));
    }

    if config.input_path == config.output_path {
        return Err(ConfigError::Validation(format!(
            "input_path and output_path must differ, both are '{}'",
            config.input_path
        )));
    }

    if config.status_path.is_empty() {
        return Err(ConfigError::Validation(
            "status_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the email ranking policy
fn validate_email_policy(policy: &EmailPolicy) -> Result<(), ConfigError> {
    if policy.max_emails < 1 {
        return Err(ConfigError::Validation(
            "max_emails must be >= 1".to_string(),
        ));
    }

    for prefix in &policy.role_prefixes {
        if prefix.is_empty() || prefix.contains('@') || prefix != &prefix.to_lowercase() {
            return Err(ConfigError::Validation(format!(
                "role prefix '{}' must be a non-empty lowercase local-part prefix",
                prefix
            )));
        }
    }

    for domain in &policy.free_domains {
        validate_free_domain(domain)?;
    }

    Ok(())
}

/// Validates a free-mail domain entry (full domain or `label.` marker)
fn validate_free_domain(domain: &str) -> Result<(), ConfigError> {
    let body = domain.strip_suffix('.').unwrap_or(domain);

    if body.is_empty() {
        return Err(ConfigError::Validation(
            "free domain entries cannot be empty".to_string(),
        ));
    }

    if !body
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "free domain '{}' contains invalid characters",
            domain
        )));
    }

    if body.starts_with('.') || body.contains("..") {
        return Err(ConfigError::Validation(format!(
            "free domain '{}' is malformed",
            domain
        )));
    }

    Ok(())
}
