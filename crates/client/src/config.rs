//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TRADEHUB_API_BASE_URL` - Base URL of the TradeHub backend
//!
//! ## Optional
//! - `TRADEHUB_HTTP_TIMEOUT_SECS` - Per-request HTTP timeout (default: 30)
//! - `TRADEHUB_CART_SYNC_TIMEOUT_SECS` - Bound on a single cart
//!   reconciliation attempt (default: 10)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CART_SYNC_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client application configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the TradeHub backend API.
    pub api_base_url: Url,
    /// Timeout applied to every HTTP request.
    pub http_timeout: Duration,
    /// Bound on a single cart reconciliation attempt.
    ///
    /// A reconciliation that does not settle within this window is treated
    /// as a transient failure: the session reverts to unsynced and a later
    /// trigger may retry.
    pub cart_sync_timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url(
            "TRADEHUB_API_BASE_URL",
            &get_required_env("TRADEHUB_API_BASE_URL")?,
        )?;
        let http_timeout = parse_secs(
            "TRADEHUB_HTTP_TIMEOUT_SECS",
            &get_env_or_default("TRADEHUB_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
        )?;
        let cart_sync_timeout = parse_secs(
            "TRADEHUB_CART_SYNC_TIMEOUT_SECS",
            &get_env_or_default(
                "TRADEHUB_CART_SYNC_TIMEOUT_SECS",
                DEFAULT_CART_SYNC_TIMEOUT_SECS,
            ),
        )?;

        Ok(Self {
            api_base_url,
            http_timeout,
            cart_sync_timeout,
        })
    }

    /// Build a configuration directly, for tests and embedders that do not
    /// read the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `api_base_url` is not a valid URL.
    pub fn new(api_base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url("api_base_url", api_base_url)?,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            cart_sync_timeout: Duration::from_secs(DEFAULT_CART_SYNC_TIMEOUT_SECS),
        })
    }
}

fn get_required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn get_env_or_default(name: &str, default_secs: u64) -> String {
    std::env::var(name).unwrap_or_else(|_| default_secs.to_string())
}

fn parse_base_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string()))
}

fn parse_secs(name: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_valid_url() {
        let config = ClientConfig::new("https://api.tradehub.dev").expect("valid config");
        assert_eq!(config.api_base_url.as_str(), "https://api.tradehub.dev/");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.cart_sync_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ClientConfig::new("not a url").expect_err("invalid url");
        assert!(matches!(err, ConfigError::InvalidEnvVar(name, _) if name == "api_base_url"));
    }

    #[test]
    fn test_parse_secs_rejects_garbage() {
        let err = parse_secs("TRADEHUB_HTTP_TIMEOUT_SECS", "soon").expect_err("invalid secs");
        assert_eq!(
            err.to_string(),
            "Invalid environment variable TRADEHUB_HTTP_TIMEOUT_SECS: invalid digit found in string"
        );
    }

    #[test]
    fn test_missing_env_var_display() {
        let err = ConfigError::MissingEnvVar("TRADEHUB_API_BASE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: TRADEHUB_API_BASE_URL"
        );
    }
}
