//! Per-scrape metric store.

use std::collections::HashMap;

use tracing::trace;

use crate::exposition::{Labels, parse_line};

/// A sample as stored under its metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledValue {
    pub labels: Labels,
    pub value: f64,
}

/// Counters describing how a scrape body was consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    /// Lines read from the body.
    pub lines: usize,
    /// Lines that produced a sample.
    pub samples: usize,
    /// Comments, blank lines and lines that did not parse.
    pub skipped: usize,
}

/// Samples of one scrape, grouped by metric family.
///
/// Samples keep the order in which they appeared in the body, which the
/// reconstruction step relies on for last-write-wins merging. Families are
/// not filtered here.
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    families: HashMap<String, Vec<LabeledValue>>,
    stats: ScrapeStats,
}

impl MetricStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a complete scrape body.
    pub fn from_text(body: &str) -> Self {
        let mut store = Self::new();
        for line in body.lines() {
            store.push_line(line);
        }
        store
    }

    /// Parse and record a single line.
    pub fn push_line(&mut self, line: &str) {
        self.stats.lines += 1;

        let Some(sample) = parse_line(line).into_sample() else {
            self.stats.skipped += 1;
            trace!(line, "Skipping non-sample line");
            return;
        };

        self.stats.samples += 1;
        self.families
            .entry(sample.metric)
            .or_default()
            .push(LabeledValue {
                labels: sample.labels,
                value: sample.value,
            });
    }

    /// Samples recorded for a metric family, in input order.
    pub fn samples(&self, metric: &str) -> &[LabeledValue] {
        self.families.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of all metric families seen.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    /// Number of distinct metric families.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Total number of samples across all families.
    pub fn sample_count(&self) -> usize {
        self.stats.samples
    }

    pub fn stats(&self) -> ScrapeStats {
        self.stats
    }
}
