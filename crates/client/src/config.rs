//! Client configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // API
    pub api_url: Url,
    pub request_timeout_ms: u64,

    // Durable storage
    pub profile_dir: PathBuf,

    // Chat
    pub pending_chat_ttl_secs: u64, // 0 disables expiry

    // Auth
    pub auth_ready_timeout_ms: u64,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // API
            api_url: {
                let raw = env::var("PROLINK_API_URL")
                    .map_err(|_| ConfigError::Missing("PROLINK_API_URL"))?;
                let url = Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw.clone()))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidUrl(raw));
                }
                url
            },
            request_timeout_ms: env::var("PROLINK_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10_000),

            // Durable storage
            profile_dir: env::var("PROLINK_PROFILE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".prolink")),

            // Chat
            pending_chat_ttl_secs: env::var("PROLINK_PENDING_CHAT_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86_400),

            // Auth
            auth_ready_timeout_ms: env::var("PROLINK_AUTH_READY_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5_000),
            email: env::var("PROLINK_EMAIL").ok().filter(|v| !v.is_empty()),
            password: env::var("PROLINK_PASSWORD").ok().filter(|v| !v.is_empty()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn auth_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_ready_timeout_ms)
    }

    /// Maximum age of a pending chat intent, `None` when expiry is disabled
    pub fn pending_chat_ttl(&self) -> Option<Duration> {
        match self.pending_chat_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Sign-in credentials, when both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}
