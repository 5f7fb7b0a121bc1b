use crate::config::types::{Config, CrawlerConfig, EndpointConfig, PredicateConfig, SessionConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_session_config(&config.session)?;
    validate_endpoint_config(&config.endpoints)?;
    validate_crawler_config(&config.crawler)?;
    validate_predicate_config(&config.predicate)?;
    Ok(())
}

/// Validates session credentials
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.bearer_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bearer_token cannot be empty".to_string(),
        ));
    }

    if config.csrf_token().is_none() {
        return Err(ConfigError::Validation(
            "csrf_token is missing and the cookie has no ct0 value".to_string(),
        ));
    }

    if config.cookie.contains('\n') || config.cookie.contains('\r') {
        return Err(ConfigError::Validation(
            "cookie must be a single header line".to_string(),
        ));
    }

    Ok(())
}

/// Validates endpoint URLs
fn validate_endpoint_config(config: &EndpointConfig) -> Result<(), ConfigError> {
    validate_endpoint("platform_url", &config.platform_url)?;
    validate_endpoint("tweet_detail", &config.tweet_detail)?;
    validate_endpoint("following", &config.following)?;
    validate_endpoint("block_user", &config.block_user)?;
    Ok(())
}

/// Validates a single endpoint URL (http or https)
fn validate_endpoint(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use the http or https scheme",
            name, value
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.following_page_size < 1 || config.following_page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "following_page_size must be between 1 and 100, got {}",
            config.following_page_size
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 1s, got {}s",
            config.request_timeout
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

/// Validates predicate store configuration
fn validate_predicate_config(config: &PredicateConfig) -> Result<(), ConfigError> {
    if config.store_path.is_empty() {
        return Err(ConfigError::Validation(
            "store_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("x", "https://x.com/i/api/graphql/abc/TweetDetail").is_ok());
        assert!(validate_endpoint("x", "http://127.0.0.1:8080/TweetDetail").is_ok());

        assert!(validate_endpoint("x", "").is_err());
        assert!(validate_endpoint("x", "not a url").is_err());
        assert!(validate_endpoint("x", "ftp://x.com/file").is_err());
    }

    #[test]
    fn test_validate_crawler_config() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.following_page_size = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.following_page_size = 20;
        config.max_retries = 11;
        assert!(validate_crawler_config(&config).is_err());

        config.max_retries = 0;
        config.request_timeout = 0;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_session_requires_csrf() {
        let session = SessionConfig {
            bearer_token: "token".to_string(),
            cookie: "auth_token=abc".to_string(),
            csrf_token: None,
        };
        assert!(matches!(
            validate_session_config(&session),
            Err(ConfigError::Validation(_))
        ));
    }
}
