//! HTML rendering of the monitor dashboard.

use std::fmt::Write;

use subtime_common::monitor::{Monitor, MonitorStatus};

use crate::snapshot::Snapshot;

/// Static details shown on the dashboard.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Upstream base URL.
    pub source: String,
    /// Poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Base URL used for per-monitor health links.
    pub base_url: String,
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;width:100%}\
th,td{padding:.4rem .6rem;border-bottom:1px solid #ddd;text-align:left}\
.up{color:#1a7f37}.down{color:#cf222e}.unknown{color:#6e7781}\
.error{background:#ffebe9;padding:.6rem;border-radius:4px}\
.meta{color:#57606a}";

/// CSS class for a monitor's status.
pub fn status_class(status: Option<MonitorStatus>) -> &'static str {
    match status {
        Some(MonitorStatus::Up) => "up",
        Some(MonitorStatus::Down) => "down",
        None => "unknown",
    }
}

fn status_label(status: Option<MonitorStatus>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Render the dashboard page for a snapshot.
pub fn render_index(snapshot: &Snapshot, ctx: &PageContext) -> String {
    let mut out = String::with_capacity(2048 + snapshot.monitors.len() * 512);

    let last_update = snapshot
        .last_update
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Never".to_string());

    writeln!(out, "<!DOCTYPE html>").ok();
    writeln!(out, "<html lang=\"en\">").ok();
    writeln!(out, "<head>").ok();
    writeln!(out, "<meta charset=\"utf-8\">").ok();
    writeln!(out, "<title>Subtime</title>").ok();
    writeln!(out, "<style>{}</style>", STYLE).ok();
    writeln!(out, "</head>").ok();
    writeln!(out, "<body>").ok();
    writeln!(out, "<h1>Subtime</h1>").ok();
    writeln!(
        out,
        "<p class=\"meta\">Source: {} &middot; Last update: {} &middot; Poll interval: {}s &middot; Monitors: {}</p>",
        escape_html(&ctx.source),
        escape_html(&last_update),
        ctx.poll_interval_secs,
        snapshot.monitors.len()
    )
    .ok();

    if let Some(error) = &snapshot.last_error {
        writeln!(
            out,
            "<p class=\"error\">Last fetch failed: {}</p>",
            escape_html(error)
        )
        .ok();
    }

    if snapshot.monitors.is_empty() {
        writeln!(out, "<p>No monitors found.</p>").ok();
    } else {
        writeln!(out, "<table>").ok();
        writeln!(
            out,
            "<thead><tr><th>#</th><th>Name</th><th>Status</th><th>Type</th><th>URL</th>\
             <th>Response time</th><th>Certificate</th><th>Health endpoint</th></tr></thead>"
        )
        .ok();
        writeln!(out, "<tbody>").ok();
        for (index, monitor) in snapshot.monitors.iter().enumerate() {
            render_row(&mut out, index, monitor, &ctx.base_url);
        }
        writeln!(out, "</tbody>").ok();
        writeln!(out, "</table>").ok();
    }

    writeln!(out, "</body>").ok();
    writeln!(out, "</html>").ok();

    out
}

fn render_row(out: &mut String, index: usize, monitor: &Monitor, base_url: &str) {
    let health_url = format!("{}/monitor/{}", base_url, monitor.slug());
    let url = match monitor.url.as_deref() {
        Some(u) if is_http_link(u) => format!("<a href=\"{0}\">{0}</a>", escape_html(u)),
        Some(u) => escape_html(u),
        None => "-".to_string(),
    };
    let response_time = monitor
        .response_time_ms
        .map(|ms| format!("{} ms", format_number(ms)))
        .unwrap_or_else(|| "-".to_string());
    let cert = monitor
        .cert_days_remaining
        .map(|days| format!("{} days", format_number(days)))
        .unwrap_or_else(|| "-".to_string());

    writeln!(
        out,
        "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td>\
         <td>{}</td><td>{}</td><td><a href=\"{health}\">{health}</a></td></tr>",
        index + 1,
        escape_html(&monitor.name),
        status_class(monitor.status),
        status_label(monitor.status),
        escape_html(&monitor.monitor_type),
        url,
        response_time,
        cert,
        health = escape_html(&health_url),
    )
    .ok();
}

/// Only plain web URLs are rendered as links.
fn is_http_link(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Format a number without a trailing `.0` for whole values.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Escape text for inclusion in HTML content and attribute values.
pub fn escape_html(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
