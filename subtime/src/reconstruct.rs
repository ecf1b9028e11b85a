//! Monitor reconstruction from the per-scrape metric store.
//!
//! The upstream exports one gauge family per monitor attribute, all keyed by
//! the `monitor_name` label. This module joins those families back into one
//! [`Monitor`] per name.

use std::collections::HashMap;

use subtime_common::monitor::{DEFAULT_MONITOR_TYPE, Monitor, MonitorStatus};

use crate::exposition::Labels;
use crate::store::MetricStore;

pub const MONITOR_STATUS: &str = "monitor_status";
pub const MONITOR_RESPONSE_TIME: &str = "monitor_response_time";
pub const MONITOR_CERT_DAYS_REMAINING: &str = "monitor_cert_days_remaining";

pub const LABEL_NAME: &str = "monitor_name";
pub const LABEL_TYPE: &str = "monitor_type";
pub const LABEL_URL: &str = "monitor_url";
pub const LABEL_HOSTNAME: &str = "monitor_hostname";
pub const LABEL_PORT: &str = "monitor_port";

/// Label value the upstream uses to mean "not set".
const NULL_SENTINEL: &str = "null";

/// Metric families that contribute to a monitor, in processing order.
///
/// The order decides which family's labels seed a monitor and the order of
/// the resulting list.
const FAMILIES: [(&str, Field); 3] = [
    (MONITOR_STATUS, Field::Status),
    (MONITOR_RESPONSE_TIME, Field::ResponseTime),
    (MONITOR_CERT_DAYS_REMAINING, Field::CertDaysRemaining),
];

#[derive(Debug, Clone, Copy)]
enum Field {
    Status,
    ResponseTime,
    CertDaysRemaining,
}

impl Field {
    fn apply(self, monitor: &mut Monitor, value: f64) {
        match self {
            Field::Status => monitor.status = Some(MonitorStatus::from_gauge(value)),
            Field::ResponseTime => monitor.response_time_ms = Some(value),
            Field::CertDaysRemaining => monitor.cert_days_remaining = Some(value),
        }
    }
}

/// Rebuild the list of monitors described by a scrape.
///
/// Monitors appear in the order their name was first seen. Samples without a
/// usable `monitor_name` are dropped and unrelated families are ignored. When
/// a family reports the same monitor twice, the later sample wins.
pub fn reconstruct(store: &MetricStore) -> Vec<Monitor> {
    let mut monitors: Vec<Monitor> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (family, field) in FAMILIES {
        for sample in store.samples(family) {
            let Some(name) = sample
                .labels
                .get(LABEL_NAME)
                .filter(|name| !name.is_empty())
            else {
                continue;
            };

            let slot = match index.get(name) {
                Some(&slot) => slot,
                None => {
                    monitors.push(seed_monitor(name, &sample.labels));
                    index.insert(name.clone(), monitors.len() - 1);
                    monitors.len() - 1
                }
            };

            field.apply(&mut monitors[slot], sample.value);
        }
    }

    monitors
}

/// Create a monitor from the descriptive labels of its first sample.
fn seed_monitor(name: &str, labels: &Labels) -> Monitor {
    let mut monitor = Monitor::new(name);

    monitor.monitor_type = present(labels, LABEL_TYPE)
        .unwrap_or(DEFAULT_MONITOR_TYPE)
        .to_string();
    monitor.url = present(labels, LABEL_URL).map(str::to_string);
    monitor.hostname = non_null(labels, LABEL_HOSTNAME);
    monitor.port = non_null(labels, LABEL_PORT);

    monitor
}

/// A label value that is set and non-empty.
fn present<'a>(labels: &'a Labels, key: &str) -> Option<&'a str> {
    labels
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Like [`present`], additionally treating the literal `null` as unset.
fn non_null(labels: &Labels, key: &str) -> Option<String> {
    present(labels, key)
        .filter(|value| *value != NULL_SENTINEL)
        .map(str::to_string)
}
