use crate::config::types::{
    Config, CrawlerConfig, ProxyConfig, RankerConfig, StorageConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_proxy_config(&config.proxy)?;
    validate_ranker_config(&config.ranker)?;
    validate_storage_config(&config.storage)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 {
        return Err(ConfigError::Validation(format!(
            "workers must be >= 1, got {}",
            config.workers
        )));
    }

    if config.request_timeout_s < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-s must be >= 1, got {}",
            config.request_timeout_s
        )));
    }

    if config.depth_max < 1 {
        return Err(ConfigError::Validation(format!(
            "depth-max must be >= 1, got {}",
            config.depth_max
        )));
    }

    if config.max_body_bytes < 1 {
        return Err(ConfigError::Validation(
            "max-body-bytes must be >= 1".to_string(),
        ));
    }

    if config.connection_pool_size < 1 {
        return Err(ConfigError::Validation(
            "connection-pool-size must be >= 1".to_string(),
        ));
    }

    if config.store_failure_threshold < 1 {
        return Err(ConfigError::Validation(
            "store-failure-threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    validate_endpoint(&config.socks_endpoint)?;

    if let Some(control) = &config.control_endpoint {
        validate_endpoint(control)?;
    }

    Ok(())
}

fn validate_ranker_config(config: &RankerConfig) -> Result<(), ConfigError> {
    if config.rank_refresh_s < 1 {
        return Err(ConfigError::Validation(
            "rank-refresh-s must be >= 1".to_string(),
        ));
    }

    if config.pagerank_iters < 1 {
        return Err(ConfigError::Validation(
            "pagerank-iters must be >= 1".to_string(),
        ));
    }

    if !(config.damping > 0.0 && config.damping < 1.0) {
        return Err(ConfigError::Validation(format!(
            "damping must be in (0, 1), got {}",
            config.damping
        )));
    }

    if config.top_k < 1 {
        return Err(ConfigError::Validation("top-k must be >= 1".to_string()));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidEndpoint(format!("invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates a seed URL list: each entry must parse, with scheme http or https.
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidEndpoint(format!("invalid seed '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "seed '{}' must use http or https",
                seed
            )));
        }
    }
    Ok(())
}

/// Validates a `host:port` endpoint string.
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let (host, port) = endpoint.rsplit_once(':').ok_or_else(|| {
        ConfigError::InvalidEndpoint(format!("'{}' is not in host:port form", endpoint))
    })?;

    if host.is_empty() {
        return Err(ConfigError::InvalidEndpoint(format!(
            "'{}' has an empty host",
            endpoint
        )));
    }

    port.parse::<u16>().map_err(|_| {
        ConfigError::InvalidEndpoint(format!("'{}' has an invalid port", endpoint))
    })?;

    Ok(())
}

/// Basic email validation.
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "invalid email format: '{}'",
            email
        )));
    }

    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("127.0.0.1:9050").is_ok());
        assert!(validate_endpoint("localhost:9050").is_ok());

        assert!(validate_endpoint("127.0.0.1").is_err());
        assert!(validate_endpoint(":9050").is_err());
        assert!(validate_endpoint("127.0.0.1:notaport").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.onion").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_seeds() {
        assert!(validate_seeds(&["http://abc.onion/".to_string()]).is_ok());
        assert!(validate_seeds(&["ftp://abc.onion/".to_string()]).is_err());
        assert!(validate_seeds(&["not a url".to_string()]).is_err());
    }
}
