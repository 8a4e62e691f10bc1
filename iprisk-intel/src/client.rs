//! HTTP client for intelligence sources
//!
//! One configured `reqwest::Client` is shared by every remote source.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Intel networking configuration
#[derive(Debug, Clone)]
pub struct IntelConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: format!("iprisk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl IntelConfig {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Errors from intelligence sources
#[derive(Debug, Error)]
pub enum IntelError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{source_name} returned status {status}")]
    Status { source_name: &'static str, status: u16 },

    #[error("API error: {0}")]
    Api(serde_json::Value),

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Create an HTTP client for intel lookups
pub fn create_client(config: &IntelConfig) -> Result<Client, IntelError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| IntelError::ClientBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IntelConfig::default();
        assert_eq!(config.timeout_secs, 20);
        assert!(config.user_agent.starts_with("iprisk/"));
    }

    #[test]
    fn test_create_client() {
        let config = IntelConfig::default().with_timeout(5);
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_status_error_message() {
        let err = IntelError::Status {
            source_name: "onionoo",
            status: 503,
        };
        assert_eq!(err.to_string(), "onionoo returned status 503");
    }
}
