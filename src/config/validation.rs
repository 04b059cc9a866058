use crate::config::types::{Config, CrawlerConfig, OverflowKind, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Largest frontier the crawler accepts
const MAX_FRONTIER_CAPACITY: usize = 1_000_000;

/// Largest fetch fan-out the crawler accepts
const MAX_CONCURRENT_FETCHES: usize = 100;

/// Validates the entire configuration
///
/// # Arguments
///
/// * `config` - The configuration to validate
///
/// # Returns
///
/// * `Ok(())` - Configuration is valid
/// * `Err(ConfigError::Validation)` - A value is out of range or missing
/// * `Err(ConfigError::InvalidUrl)` - A seed is not an absolute URL
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates pipeline sizing, policies and seeds
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.frontier_capacity < 1 || config.frontier_capacity > MAX_FRONTIER_CAPACITY {
        return Err(ConfigError::Validation(format!(
            "frontier_capacity must be between 1 and {}, got {}",
            MAX_FRONTIER_CAPACITY, config.frontier_capacity
        )));
    }

    if config.page_channel_capacity < 1 {
        return Err(ConfigError::Validation(
            "page_channel_capacity must be >= 1".to_string(),
        ));
    }

    if config.discovery_channel_capacity < 1 {
        return Err(ConfigError::Validation(
            "discovery_channel_capacity must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
    {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and {}, got {}",
            MAX_CONCURRENT_FETCHES, config.max_concurrent_fetches
        )));
    }

    if config.overflow_policy == OverflowKind::BlockFor && config.overflow_wait_ms == 0 {
        return Err(ConfigError::Validation(
            "overflow_wait_ms must be > 0 when overflow_policy is block-for".to_string(),
        ));
    }

    if config.max_duration_secs == Some(0) {
        return Err(ConfigError::Validation(
            "max_duration_secs must be > 0 when set".to_string(),
        ));
    }

    validate_seeds(&config.seeds)
}

/// Seeds must be absolute URLs; they are never resolved against anything
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        Url::parse(seed).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
        })?;
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
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

    validate_email(&config.contact_email)?;

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
