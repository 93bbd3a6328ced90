//! Client configuration loaded from arguments or environment variables.

use crate::error::ClientError;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_USER_AGENT: &str = concat!("dev2gis-client/", env!("CARGO_PKG_VERSION"));

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL without trailing slash, e.g. `http://localhost:8080/api`
    pub base_url: String,

    /// Overall per-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `DEV2GIS_API_URL` (default `http://localhost:8080/api`)
    /// - `DEV2GIS_TIMEOUT_SECS` (optional)
    /// - `DEV2GIS_USER_AGENT` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let base_url = env::var("DEV2GIS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid("DEV2GIS_API_URL", base_url));
        }

        let timeout = match env::var("DEV2GIS_TIMEOUT_SECS") {
            Ok(raw) => Some(Duration::from_secs(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid("DEV2GIS_TIMEOUT_SECS", raw.clone()))?,
            )),
            Err(_) => None,
        };

        let mut config = Self::new(base_url);
        config.timeout = timeout;
        if let Ok(agent) = env::var("DEV2GIS_USER_AGENT") {
            config.user_agent = agent;
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Resolve a path or absolute URL against the base URL
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        ClientError::Configuration(err.to_string())
    }
}
