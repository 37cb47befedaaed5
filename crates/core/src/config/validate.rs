use reqwest::Url;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Transport timeout and attempt budget are non-zero
/// - Pipeline concurrency is at least 1
/// - Every platform base URL parses
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.transport.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transport.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.transport.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "transport.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.pipeline.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_concurrent_jobs cannot be 0".to_string(),
        ));
    }

    let platform = &config.platform;
    for (name, url) in [
        ("platform.users_url", &platform.users_url),
        ("platform.auth_url", &platform.auth_url),
        ("platform.develop_url", &platform.develop_url),
        ("platform.asset_delivery_url", &platform.asset_delivery_url),
        ("platform.publish_url", &platform.publish_url),
    ] {
        Url::parse(url)
            .map_err(|e| ConfigError::ValidationError(format!("{} is invalid: {}", name, e)))?;
    }

    Ok(())
}
