//! Environment-driven configuration for the API client.

use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

/// Default coding API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Default host application API base URL.
pub const DEFAULT_HOST_BASE_URL: &str = "http://localhost:3000/api/base-app";

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

pub const ENV_BASE_URL: &str = "CODING_API_BASE_URL";
pub const ENV_HOST_BASE_URL: &str = "HOST_APP_API_URL";
pub const ENV_TIMEOUT_MS: &str = "CODING_API_TIMEOUT_MS";
pub const ENV_RETRY_ATTEMPTS: &str = "CODING_API_RETRY_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "CODING_API_RETRY_DELAY_MS";

/// Configuration errors.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// API client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL for suggestions, analysis, search and rationale
    pub base_url: String,
    /// Base URL of the host application receiving submissions
    pub host_base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            host_base_url: DEFAULT_HOST_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl ApiConfig {
    /// Load a `.env` file if present, then read the process environment.
    pub fn load() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup(ENV_BASE_URL)) {
            config.base_url = url;
        }
        if let Some(url) = non_empty(lookup(ENV_HOST_BASE_URL)) {
            config.host_base_url = url;
        }
        if let Some(ms) = parse_u64(ENV_TIMEOUT_MS, lookup(ENV_TIMEOUT_MS))? {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_u64(ENV_RETRY_ATTEMPTS, lookup(ENV_RETRY_ATTEMPTS))? {
            config.retry.max_retries = u32::try_from(attempts).map_err(|_| {
                ConfigError::InvalidValue {
                    key: ENV_RETRY_ATTEMPTS.to_string(),
                    value: attempts.to_string(),
                }
            })?;
        }
        if let Some(ms) = parse_u64(ENV_RETRY_DELAY_MS, lookup(ENV_RETRY_DELAY_MS))? {
            config.retry.base_delay = Duration::from_millis(ms);
        }

        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.host_base_url = config.host_base_url.trim_end_matches('/').to_string();
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u64(key: &str, value: Option<String>) -> ConfigResult<Option<u64>> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://coding.example.org/api/"),
            (ENV_TIMEOUT_MS, "5000"),
            (ENV_RETRY_ATTEMPTS, "1"),
            (ENV_RETRY_DELAY_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://coding.example.org/api");
        assert_eq!(config.host_base_url, DEFAULT_HOST_BASE_URL);
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "  ")])).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_invalid_number() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_RETRY_ATTEMPTS, "three")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_RETRY_ATTEMPTS.to_string(),
                value: "three".to_string(),
            }
        );
    }
}
