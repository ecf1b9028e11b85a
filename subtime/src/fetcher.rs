//! Upstream metrics fetching.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::UpstreamConfig;

/// Errors that can occur while fetching a scrape from the upstream.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// No answer within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Any other transport failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The response body could not be read as text.
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// A source of raw exposition text.
pub trait MetricsSource: Send + Sync {
    /// Fetch one complete scrape body.
    fn fetch(&self) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Human-readable location of the source, for logs.
    fn location(&self) -> &str;
}

/// Fetches `{url}/metrics` from an Uptime Kuma instance over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    metrics_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpSource {
    /// Create a source from the upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("subtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            metrics_url: config.metrics_url(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

impl MetricsSource for HttpSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let mut request = self.client.get(&self.metrics_url);
        // Uptime Kuma takes API keys as the basic auth password.
        if let Some(key) = &self.api_key {
            request = request.basic_auth("", Some(key));
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        debug!(url = %self.metrics_url, bytes = body.len(), "Fetched metrics");
        Ok(body)
    }

    fn location(&self) -> &str {
        &self.metrics_url
    }
}
