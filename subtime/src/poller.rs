//! Periodic upstream polling.
//!
//! Each cycle fetches one scrape, rebuilds the monitor list and publishes it.
//! Cycles run one at a time on a single task. When a cycle outlasts the poll
//! interval, the ticks it overlapped are skipped rather than queued.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::fetcher::{FetchError, MetricsSource};
use crate::reconstruct::reconstruct;
use crate::snapshot::SharedSnapshot;
use crate::store::{MetricStore, ScrapeStats};

/// Outcome of a successful poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Monitors published.
    pub monitors: usize,
    /// How the scrape body was consumed.
    pub scrape: ScrapeStats,
}

/// Polls a [`MetricsSource`] and publishes the result.
pub struct Poller<S> {
    source: S,
    snapshot: SharedSnapshot,
    interval: Duration,
}

impl<S: MetricsSource> Poller<S> {
    pub fn new(source: S, snapshot: SharedSnapshot, interval: Duration) -> Self {
        Self {
            source,
            snapshot,
            interval,
        }
    }

    /// Run a single fetch, parse and publish cycle.
    ///
    /// On failure the published monitors are left untouched and only the
    /// snapshot's error is updated.
    pub async fn poll_once(&self) -> Result<PollReport, FetchError> {
        let body = match self.source.fetch().await {
            Ok(body) => body,
            Err(e) => {
                self.snapshot.record_failure(e.to_string());
                return Err(e);
            }
        };

        let store = MetricStore::from_text(&body);
        debug!(
            families = store.len(),
            samples = store.sample_count(),
            "Parsed scrape"
        );
        trace!(families = ?store.families().collect::<Vec<_>>(), "Metric families");

        let monitors = reconstruct(&store);
        let report = PollReport {
            monitors: monitors.len(),
            scrape: store.stats(),
        };

        self.snapshot.publish(monitors);
        Ok(report)
    }

    /// Poll until the shutdown signal is received.
    ///
    /// The first cycle starts immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            source = %self.source.location(),
            interval_secs = self.interval.as_secs_f64(),
            "Starting poller"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Poller stopped");
    }

    async fn cycle(&self) {
        let started = Instant::now();

        match self.poll_once().await {
            Ok(report) => {
                let snapshot = self.snapshot.load();
                info!(
                    monitors = report.monitors,
                    up = snapshot.up_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Updated monitors"
                );
                debug!(
                    lines = report.scrape.lines,
                    samples = report.scrape.samples,
                    skipped = report.scrape.skipped,
                    "Scrape consumed"
                );
            }
            Err(e) => {
                warn!(
                    source = %self.source.location(),
                    error = %e,
                    "Failed to fetch monitors, keeping previous data"
                );
            }
        }

        if started.elapsed() > self.interval {
            warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Poll cycle exceeded the poll interval, skipping missed ticks"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use subtime_common::monitor::MonitorStatus;

    use crate::snapshot::SnapshotCell;

    /// Source that replays a script of responses. A final successful body repeats.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<String, FetchError>>>,
        fetches: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<String, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl MetricsSource for ScriptedSource {
        async fn fetch(&self) -> Result<String, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            match script.pop_front() {
                Some(Ok(body)) => {
                    if script.is_empty() {
                        script.push_back(Ok(body.clone()));
                    }
                    Ok(body)
                }
                Some(Err(e)) => Err(e),
                None => Err(FetchError::Http("script exhausted".to_string())),
            }
        }

        fn location(&self) -> &str {
            "scripted"
        }
    }

    const SCRAPE: &str = r#"# TYPE monitor_status gauge
monitor_status{monitor_name="web",monitor_type="http",monitor_url="https://example.com",monitor_hostname="null",monitor_port="null"} 1
monitor_status{monitor_name="db",monitor_type="port",monitor_url="",monitor_hostname="db.internal",monitor_port="5432"} 0
monitor_response_time{monitor_name="web"} 87
"#;

    fn make_poller(
        script: Vec<Result<String, FetchError>>,
    ) -> (Poller<ScriptedSource>, SharedSnapshot) {
        let snapshot = Arc::new(SnapshotCell::new());
        let poller = Poller::new(
            ScriptedSource::new(script),
            snapshot.clone(),
            Duration::from_millis(20),
        );
        (poller, snapshot)
    }

    #[tokio::test]
    async fn test_poll_once_publishes() {
        let (poller, snapshot) = make_poller(vec![Ok(SCRAPE.to_string())]);

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.monitors, 2);
        assert_eq!(report.scrape.samples, 3);
        assert_eq!(report.scrape.skipped, 1);

        let current = snapshot.load();
        assert_eq!(current.version, 1);
        assert_eq!(current.monitors[0].name, "web");
        assert_eq!(current.monitors[0].status, Some(MonitorStatus::Up));
        assert_eq!(current.monitors[0].response_time_ms, Some(87.0));
        assert_eq!(current.monitors[1].status, Some(MonitorStatus::Down));
        assert!(current.last_error.is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_monitors() {
        let (poller, snapshot) = make_poller(vec![
            Ok(SCRAPE.to_string()),
            Err(FetchError::Status {
                status: 503,
                reason: "Service Unavailable".to_string(),
            }),
        ]);

        poller.poll_once().await.unwrap();
        let first = snapshot.load();

        assert!(poller.poll_once().await.is_err());
        let second = snapshot.load();

        assert_eq!(second.monitors, first.monitors);
        assert_eq!(second.last_update, first.last_update);
        assert_eq!(
            second.last_error.as_deref(),
            Some("HTTP 503: Service Unavailable")
        );
    }

    #[tokio::test]
    async fn test_success_clears_error() {
        let (poller, snapshot) = make_poller(vec![
            Err(FetchError::Connection("refused".to_string())),
            Ok(SCRAPE.to_string()),
        ]);

        assert!(poller.poll_once().await.is_err());
        assert!(!snapshot.load().has_succeeded());
        assert!(snapshot.load().last_error.is_some());

        poller.poll_once().await.unwrap();
        assert!(snapshot.load().has_succeeded());
        assert!(snapshot.load().last_error.is_none());
    }

    #[tokio::test]
    async fn test_garbage_body_yields_empty_list() {
        let (poller, snapshot) =
            make_poller(vec![Ok("<html>not metrics</html>\n".to_string())]);

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.monitors, 0);
        let current = snapshot.load();
        assert!(current.monitors.is_empty());
        assert!(current.has_succeeded());
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (poller, snapshot) = make_poller(vec![Ok(SCRAPE.to_string())]);
        let fetches = poller.source.fetches.clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop")
            .unwrap();

        assert!(fetches.load(Ordering::SeqCst) >= 2);
        assert_eq!(snapshot.load().monitors.len(), 2);
    }
}
