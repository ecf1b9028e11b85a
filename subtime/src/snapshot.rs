//! Published view of the upstream monitors.
//!
//! The poller is the only writer. Readers grab an `Arc<Snapshot>` and keep a
//! consistent view for as long as they hold it, no matter how many polls
//! complete in the meantime.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use subtime_common::monitor::Monitor;

/// An immutable snapshot of the last known monitor state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Incremented on every replacement. `0` is the initial empty snapshot.
    pub version: u64,
    /// Monitors from the last successful poll.
    pub monitors: Vec<Monitor>,
    /// When the last successful poll completed.
    pub last_update: Option<DateTime<Utc>>,
    /// Why the most recent poll failed, cleared by the next success.
    pub last_error: Option<String>,
}

impl Snapshot {
    /// Whether any poll has succeeded yet.
    ///
    /// Distinguishes "never fetched" from "fetched, no monitors".
    pub fn has_succeeded(&self) -> bool {
        self.last_update.is_some()
    }

    /// Find the monitor whose name slugifies to `slug`.
    pub fn find_by_slug(&self, slug: &str) -> Option<&Monitor> {
        self.monitors.iter().find(|m| m.slug() == slug)
    }

    /// Number of monitors currently up.
    pub fn up_count(&self) -> usize {
        self.monitors.iter().filter(|m| m.is_up()).count()
    }
}

/// Owner of the current [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Arc<Snapshot>>,
}

/// Handle shared by the poller and the web handlers.
pub type SharedSnapshot = Arc<SnapshotCell>;

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Replace the monitor list after a successful poll.
    pub fn publish(&self, monitors: Vec<Monitor>) -> Arc<Snapshot> {
        self.publish_at(monitors, Utc::now())
    }

    /// Replace the monitor list with an explicit update time.
    pub fn publish_at(&self, monitors: Vec<Monitor>, at: DateTime<Utc>) -> Arc<Snapshot> {
        self.replace(|previous| Snapshot {
            version: previous.version + 1,
            monitors,
            last_update: Some(at),
            last_error: None,
        })
    }

    /// Record a failed poll, keeping the previously published monitors.
    pub fn record_failure(&self, reason: impl Into<String>) -> Arc<Snapshot> {
        let reason = reason.into();
        self.replace(|previous| Snapshot {
            version: previous.version + 1,
            monitors: previous.monitors.clone(),
            last_update: previous.last_update,
            last_error: Some(reason),
        })
    }

    fn replace(&self, build: impl FnOnce(&Snapshot) -> Snapshot) -> Arc<Snapshot> {
        let mut current = self.current.write();
        let next = Arc::new(build(&current));
        *current = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subtime_common::monitor::MonitorStatus;

    fn monitor(name: &str, status: MonitorStatus) -> Monitor {
        let mut m = Monitor::new(name);
        m.status = Some(status);
        m
    }

    #[test]
    fn test_initial_snapshot() {
        let cell = SnapshotCell::new();
        let snapshot = cell.load();

        assert_eq!(snapshot.version, 0);
        assert!(snapshot.monitors.is_empty());
        assert!(!snapshot.has_succeeded());
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_publish_replaces_everything() {
        let cell = SnapshotCell::new();
        cell.record_failure("boom");
        cell.publish(vec![monitor("a", MonitorStatus::Up)]);

        let snapshot = cell.load();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.monitors.len(), 1);
        assert!(snapshot.has_succeeded());
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_failure_keeps_previous_monitors() {
        let cell = SnapshotCell::new();
        let at = Utc::now();
        cell.publish_at(vec![monitor("a", MonitorStatus::Up)], at);

        let after = cell.record_failure("HTTP 500: Internal Server Error");

        assert_eq!(after.monitors, vec![monitor("a", MonitorStatus::Up)]);
        assert_eq!(after.last_update, Some(at));
        assert_eq!(
            after.last_error.as_deref(),
            Some("HTTP 500: Internal Server Error")
        );
    }

    #[test]
    fn test_empty_success_differs_from_never_fetched() {
        let cell = SnapshotCell::new();
        cell.record_failure("connection refused");
        assert!(!cell.load().has_succeeded());

        cell.publish(Vec::new());
        let snapshot = cell.load();
        assert!(snapshot.has_succeeded());
        assert!(snapshot.monitors.is_empty());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let cell = SnapshotCell::new();
        cell.publish(vec![monitor("a", MonitorStatus::Up)]);

        let held = cell.load();
        cell.publish(vec![monitor("b", MonitorStatus::Down)]);

        assert_eq!(held.monitors[0].name, "a");
        assert_eq!(cell.load().monitors[0].name, "b");
    }

    #[test]
    fn test_find_by_slug() {
        let cell = SnapshotCell::new();
        cell.publish(vec![
            monitor("My API", MonitorStatus::Up),
            monitor("Database", MonitorStatus::Down),
        ]);

        let snapshot = cell.load();
        assert_eq!(snapshot.find_by_slug("my-api").unwrap().name, "My API");
        assert!(snapshot.find_by_slug("My API").is_none());
        assert_eq!(snapshot.up_count(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let cell = Arc::new(SnapshotCell::new());

        let writer = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for i in 1..=200 {
                    let monitors = (0..i % 7 + 1)
                        .map(|n| monitor(&format!("m{}", n), MonitorStatus::Up))
                        .collect();
                    cell.publish(monitors);
                }
            })
        };

        for _ in 0..200 {
            let snapshot = cell.load();
            if snapshot.version > 0 {
                let expected = (snapshot.version as usize) % 7 + 1;
                assert_eq!(snapshot.monitors.len(), expected);
            }
        }

        writer.join().unwrap();
        assert_eq!(cell.load().version, 200);
    }
}
