//! Configuration for the Subtime service.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use subtime_common::config::LoggingConfig;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtimeConfig {
    /// Upstream Uptime Kuma instance.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Web server settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream, without the `/metrics` suffix.
    #[serde(default)]
    pub url: String,

    /// API key sent as the basic auth password.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Seconds between polls (default: 30).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    30
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// Full URL of the upstream metrics endpoint.
    pub fn metrics_url(&self) -> String {
        format!("{}/metrics", self.url.trim_end_matches('/'))
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:3000").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Public base URL used to build monitor links.
    ///
    /// Defaults to `http://localhost:{port}`.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Directory of static assets served for unmatched paths.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            public_url: None,
            static_dir: None,
        }
    }
}

impl HttpConfig {
    /// Base URL for links to monitor endpoints, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => {
                let port = self
                    .listen
                    .parse::<SocketAddr>()
                    .map(|addr| addr.port())
                    .unwrap_or(3000);
                format!("http://localhost:{}", port)
            }
        }
    }
}

impl SubtimeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: SubtimeConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.url.is_empty() {
            return Err(ConfigError::Validation(
                "upstream.url is required".to_string(),
            ));
        }

        if !is_http_url(&self.upstream.url) {
            return Err(ConfigError::Validation(format!(
                "upstream.url must start with http:// or https://: {}",
                self.upstream.url
            )));
        }

        if self.upstream.poll_interval_secs < 1 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be >= 1".to_string(),
            ));
        }

        if self.upstream.timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "timeout_secs must be >= 1".to_string(),
            ));
        }

        match self.http.listen.parse::<SocketAddr>() {
            Ok(addr) if addr.port() != 0 => {}
            Ok(_) => {
                return Err(ConfigError::Validation(
                    "Listen port must be between 1 and 65535".to_string(),
                ));
            }
            Err(_) => {
                return Err(ConfigError::Validation(format!(
                    "Invalid listen address: {}",
                    self.http.listen
                )));
            }
        }

        if let Some(public_url) = &self.http.public_url {
            if !is_http_url(public_url) {
                return Err(ConfigError::Validation(format!(
                    "public_url must start with http:// or https://: {}",
                    public_url
                )));
            }
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
