//! Metric data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which way a metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Lower is better (loss, error rate)
    Minimize,
    /// Higher is better (accuracy, F1)
    Maximize,
}

impl Direction {
    /// Whether `candidate` is strictly better than `incumbent`
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Minimize => f.write_str("minimize"),
            Direction::Maximize => f.write_str("maximize"),
        }
    }
}

/// A single reported value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Caller-supplied epoch
    pub epoch: u64,

    /// Reported value (always finite)
    pub value: f64,

    /// When the value was recorded
    pub recorded_at: DateTime<Utc>,
}

/// A value together with the epoch it was reported at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Metric value
    pub value: f64,

    /// Epoch of the observation
    pub epoch: u64,
}

/// Best observation seen so far for a metric
pub type BestRecord = MetricPoint;

/// Outcome of recording one observation
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// Metric name
    pub name: String,

    /// The observation that was stored
    pub point: MetricPoint,

    /// Whether this observation replaced the best record
    pub improved: bool,

    /// Best record before this observation, if any
    pub previous_best: Option<BestRecord>,
}

/// Per-metric summary used in checkpoint and completion messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Comparison direction in effect
    pub direction: Direction,

    /// Most recently reported observation
    pub latest: MetricPoint,

    /// Best observation under `direction`
    pub best: BestRecord,

    /// Number of observations
    pub count: usize,
}

/// Summary of every tracked metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Summaries keyed by metric name
    pub metrics: BTreeMap<String, SeriesSummary>,

    /// Number of distinct epochs reported
    pub total_epochs: usize,
}

impl StoreSummary {
    /// Latest value of every metric
    pub fn latest_values(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|(name, summary)| (name.clone(), summary.latest.value))
            .collect()
    }

    /// Whether no metric has been recorded
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
