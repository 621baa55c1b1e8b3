//! Directory configuration.
//!
//! Configuration is loaded from environment variables with defaults for the
//! public IAM API. Only static bearer tokens are supported; obtaining and
//! refreshing tokens happens outside this crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::cache::DEFAULT_CAPACITY;
use crate::retry::RetryConfig;

/// Default IAM API base URL.
pub const DEFAULT_API_URL: &str = "https://api.dynatrace.com/iam/v1";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration for [`HttpDirectory`](crate::http::HttpDirectory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Account UUID all requests are scoped to.
    pub account_uuid: String,

    /// IAM API base URL (e.g., "https://api.dynatrace.com/iam/v1").
    pub api_url: String,

    /// Bearer token sent with every request.
    pub bearer_token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,

    /// Time-to-live of cached responses in seconds.
    pub cache_ttl_secs: u64,

    /// Maximum number of cached responses.
    pub cache_capacity: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            account_uuid: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            bearer_token: None,
            timeout_secs: 30,
            max_retries: 3,
            cache_ttl_secs: 300,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl DirectoryConfig {
    /// Create a configuration for an account with a bearer token.
    pub fn new(account_uuid: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            account_uuid: account_uuid.into(),
            bearer_token: Some(bearer_token.into()),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DTIAM_ACCOUNT_UUID`: Account UUID
    /// - `DTIAM_BEARER_TOKEN`: Bearer token
    /// - `DTIAM_API_URL`: API base URL (default: https://api.dynatrace.com/iam/v1)
    /// - `DTIAM_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `DTIAM_MAX_RETRIES`: Retries for transient failures (default: 3)
    /// - `DTIAM_CACHE_TTL_SECS`: Cache time-to-live in seconds (default: 300)
    /// - `DTIAM_CACHE_CAPACITY`: Maximum cached responses (default: 1024)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            account_uuid: std::env::var("DTIAM_ACCOUNT_UUID").unwrap_or(default.account_uuid),
            api_url: std::env::var("DTIAM_API_URL").unwrap_or(default.api_url),
            bearer_token: std::env::var("DTIAM_BEARER_TOKEN").ok(),
            timeout_secs: std::env::var("DTIAM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timeout_secs),
            max_retries: std::env::var("DTIAM_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_retries),
            cache_ttl_secs: std::env::var("DTIAM_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.cache_ttl_secs),
            cache_capacity: std::env::var("DTIAM_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.cache_capacity),
        }
    }

    /// Validate that the configuration can reach the API.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_uuid.is_empty() {
            return Err(ConfigError::MissingEnvVar("DTIAM_ACCOUNT_UUID".to_string()));
        }
        if self.bearer_token.is_none() {
            return Err(ConfigError::MissingEnvVar("DTIAM_BEARER_TOKEN".to_string()));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "DTIAM_API_URL".to_string(),
                message: format!("expected an http(s) URL, got '{}'", self.api_url),
            });
        }
        Ok(())
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the cache time-to-live as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Retry policy derived from `max_retries`.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries.saturating_add(1),
            ..RetryConfig::standard()
        }
    }

    /// Build a full URL by appending a path to the API base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// URL of an account-scoped resource (`/accounts/{uuid}/...`).
    pub fn account_url(&self, path: &str) -> String {
        self.url(&format!(
            "accounts/{}/{}",
            self.account_uuid,
            path.trim_start_matches('/')
        ))
    }

    /// URL of an account-level repository resource (`/repo/account/{uuid}/...`).
    pub fn repo_url(&self, path: &str) -> String {
        self.url(&format!(
            "repo/account/{}/{}",
            self.account_uuid,
            path.trim_start_matches('/')
        ))
    }
}
