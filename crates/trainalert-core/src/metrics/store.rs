//! In-memory metric store with best-value bookkeeping

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    BestRecord, Direction, MetricPoint, Observation, Recorded, SeriesSummary, StoreSummary,
};

use super::direction::infer_direction;

/// All observations of one metric, in report order
#[derive(Debug, Clone)]
pub struct MetricSeries {
    name: String,
    direction: Direction,
    observations: Vec<Observation>,
    best: Option<BestRecord>,
}

impl MetricSeries {
    /// Create an empty series
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
            observations: Vec::new(),
            best: None,
        }
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Comparison direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Observations in report order
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Most recently reported observation
    pub fn latest(&self) -> Option<MetricPoint> {
        self.observations.last().map(|o| MetricPoint {
            value: o.value,
            epoch: o.epoch,
        })
    }

    /// Best observation so far
    pub fn best(&self) -> Option<BestRecord> {
        self.best
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Append an observation; `value` must already be validated as finite
    fn push(&mut self, value: f64, epoch: u64) -> Recorded {
        self.observations.push(Observation {
            epoch,
            value,
            recorded_at: Utc::now(),
        });

        let point = MetricPoint { value, epoch };
        let previous_best = self.best;
        // Ties keep the earlier record
        let improved = match previous_best {
            None => true,
            Some(best) => self.direction.is_better(value, best.value),
        };
        if improved {
            self.best = Some(point);
        }

        Recorded {
            name: self.name.clone(),
            point,
            improved,
            previous_best,
        }
    }

    fn summary(&self) -> Option<SeriesSummary> {
        Some(SeriesSummary {
            direction: self.direction,
            latest: self.latest()?,
            best: self.best?,
            count: self.observations.len(),
        })
    }
}

/// Per-metric time series for one training session
#[derive(Debug)]
pub struct MetricStore {
    series: BTreeMap<String, MetricSeries>,
    directions: HashMap<String, Direction>,
    epochs: BTreeSet<u64>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStore {
    /// Create an empty store whose clock starts now
    pub fn new() -> Self {
        Self {
            series: BTreeMap::new(),
            directions: HashMap::new(),
            epochs: BTreeSet::new(),
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    /// Fix the direction of a metric
    ///
    /// Before the first observation the override may be replaced freely; once
    /// the metric has been observed its direction can no longer change.
    pub fn set_direction(&mut self, name: &str, direction: Direction) -> Result<()> {
        if let Some(series) = self.series.get(name) {
            if series.direction != direction {
                return Err(Error::DirectionConflict {
                    name: name.to_string(),
                    existing: series.direction,
                    requested: direction,
                });
            }
            return Ok(());
        }

        self.directions.insert(name.to_string(), direction);
        Ok(())
    }

    /// Direction a metric has, or would get on first observation
    pub fn direction_of(&self, name: &str) -> Direction {
        self.series
            .get(name)
            .map(MetricSeries::direction)
            .or_else(|| self.directions.get(name).copied())
            .unwrap_or_else(|| infer_direction(name))
    }

    /// Record one observation
    ///
    /// Fails with [`Error::InvalidMetric`] on NaN or infinite values, in which
    /// case nothing is stored.
    pub fn record(&mut self, name: &str, value: f64, epoch: u64) -> Result<Recorded> {
        if !value.is_finite() {
            return Err(Error::invalid_metric(name, value));
        }
        Ok(self.record_unchecked(name, value, epoch))
    }

    /// Record a batch of observations at one epoch
    ///
    /// Every value is validated before anything is stored, so a single invalid
    /// entry leaves the store untouched. A name repeated within the batch is
    /// recorded once, with its last value, at the position it first appeared.
    pub fn record_many(&mut self, entries: &[(String, f64)], epoch: u64) -> Result<Vec<Recorded>> {
        if let Some((name, value)) = entries.iter().find(|(_, value)| !value.is_finite()) {
            return Err(Error::invalid_metric(name.as_str(), *value));
        }

        let mut batch: Vec<(&str, f64)> = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            match batch.iter_mut().find(|(seen, _)| *seen == name.as_str()) {
                Some(entry) => entry.1 = *value,
                None => batch.push((name.as_str(), *value)),
            }
        }

        Ok(batch
            .into_iter()
            .map(|(name, value)| self.record_unchecked(name, value, epoch))
            .collect())
    }

    fn record_unchecked(&mut self, name: &str, value: f64, epoch: u64) -> Recorded {
        let direction = self.direction_of(name);
        let series = self.series.entry(name.to_string()).or_insert_with(|| {
            debug!(metric = name, %direction, "Tracking new metric");
            MetricSeries::new(name, direction)
        });

        self.epochs.insert(epoch);
        series.push(value, epoch)
    }

    /// Series for a metric
    pub fn series(&self, name: &str) -> Option<&MetricSeries> {
        self.series.get(name)
    }

    /// All series, ordered by name
    pub fn iter(&self) -> impl Iterator<Item = &MetricSeries> {
        self.series.values()
    }

    /// Best record of a metric
    pub fn best(&self, name: &str) -> Option<BestRecord> {
        self.series.get(name).and_then(MetricSeries::best)
    }

    /// Latest value of every metric
    pub fn latest_values(&self) -> BTreeMap<String, f64> {
        self.series
            .iter()
            .filter_map(|(name, series)| series.latest().map(|p| (name.clone(), p.value)))
            .collect()
    }

    /// Number of tracked metrics
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether no metric has been recorded
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Latest and best value of every tracked metric
    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            metrics: self
                .series
                .iter()
                .filter_map(|(name, series)| series.summary().map(|s| (name.clone(), s)))
                .collect(),
            total_epochs: self.epochs.len(),
        }
    }

    /// Wall-clock time at which the clock was (re)started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since the clock was (re)started
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Restart the elapsed-time clock without touching recorded data
    pub fn restart_clock(&mut self) {
        self.started_at = Utc::now();
        self.clock = Instant::now();
    }
}
