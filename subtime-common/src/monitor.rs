//! Monitor entities reconstructed from an upstream scrape.
//!
//! These are the records handed to the web layer. Each one mirrors a single
//! watched target of the upstream monitoring service, identified by its
//! `monitor_name` label.

use serde::{Deserialize, Serialize};

/// Monitor type used when the upstream does not report one.
pub const DEFAULT_MONITOR_TYPE: &str = "N/A";

/// Reported availability of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    /// Target is reachable.
    Up,
    /// Target is unreachable, or reported anything other than up.
    Down,
}

impl MonitorStatus {
    /// Map a raw `monitor_status` gauge value to a status.
    ///
    /// Only an exact `1.0` means up. `NaN` and every other number is down.
    pub fn from_gauge(value: f64) -> Self {
        if value == 1.0 { Self::Up } else { Self::Down }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "UP"),
            MonitorStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// A logical monitor assembled from several metric families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    /// Value of the `monitor_name` label. Never empty.
    pub name: String,
    /// Monitor kind reported by the upstream (http, ping, dns, ...).
    #[serde(rename = "type")]
    pub monitor_type: String,
    /// Watched URL, if any.
    pub url: Option<String>,
    /// Watched hostname, if any.
    pub hostname: Option<String>,
    /// Watched port, kept as reported.
    pub port: Option<String>,
    /// `None` until a `monitor_status` sample has been seen.
    pub status: Option<MonitorStatus>,
    /// Last response time in milliseconds.
    pub response_time_ms: Option<f64>,
    /// Days until the TLS certificate expires.
    pub cert_days_remaining: Option<f64>,
}

impl Monitor {
    /// Create a monitor with default descriptive fields and no readings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            monitor_type: DEFAULT_MONITOR_TYPE.to_string(),
            url: None,
            hostname: None,
            port: None,
            status: None,
            response_time_ms: None,
            cert_days_remaining: None,
        }
    }

    /// Whether the monitor last reported up.
    pub fn is_up(&self) -> bool {
        self.status == Some(MonitorStatus::Up)
    }

    /// URL path segment identifying this monitor.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Build a URL slug from a monitor name.
///
/// The name is lowercased and every run of characters outside `[a-z0-9]`
/// collapses into a single `-`. Leading and trailing dashes are kept.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut in_gap = false;

    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push('-');
            in_gap = true;
        }
    }

    slug
}
