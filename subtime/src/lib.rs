//! Status mirror for an Uptime Kuma instance.
//!
//! Subtime polls the upstream's Prometheus `/metrics` endpoint, rebuilds the
//! list of monitors from the exported gauges and republishes it as a small
//! dashboard plus one health endpoint per monitor, suitable for status badges
//! and load balancer probes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Uptime Kuma    │────>│     Poller      │────>│  SnapshotCell   │────>│   HTTP Server   │
//! │   (/metrics)    │     │ parse + rebuild │     │  (atomic swap)  │     │ (/, /monitor/*) │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! The pipeline inside a poll is [`exposition::parse_line`] for each line,
//! [`store::MetricStore`] to group samples by family, and
//! [`reconstruct::reconstruct`] to join the families into monitors.
//!
//! # Usage
//!
//! ```bash
//! subtime --config subtime.json5
//! ```
//!
//! See [`config::SubtimeConfig`] for configuration options.

pub mod config;
pub mod exposition;
pub mod fetcher;
pub mod http;
pub mod page;
pub mod poller;
pub mod reconstruct;
pub mod snapshot;
pub mod store;

pub use config::SubtimeConfig;
pub use fetcher::{FetchError, HttpSource, MetricsSource};
pub use http::HttpServer;
pub use page::PageContext;
pub use poller::{PollReport, Poller};
pub use reconstruct::reconstruct;
pub use snapshot::{SharedSnapshot, Snapshot, SnapshotCell};
pub use store::MetricStore;
