//! Metric-history attachments

use serde::Serialize;
use tracing::warn;

use super::PlotRenderer;
use crate::metrics::MetricStore;
use crate::models::Attachment;

/// Attaches the full metric history as `metrics.csv`
///
/// Rows are grouped by metric (alphabetical) and kept in report order within
/// each metric.
#[derive(Debug, Clone)]
pub struct CsvHistoryRenderer {
    filename: String,
}

impl Default for CsvHistoryRenderer {
    fn default() -> Self {
        Self {
            filename: "metrics.csv".to_string(),
        }
    }
}

impl CsvHistoryRenderer {
    /// Create a renderer producing `metrics.csv`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another attachment name
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}

/// One observation in the history file
#[derive(Serialize)]
struct HistoryRow<'a> {
    metric: &'a str,
    epoch: u64,
    value: f64,
    recorded_at: String,
}

fn history_csv(store: &MetricStore) -> csv::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for series in store.iter() {
        for observation in series.observations() {
            writer.serialize(HistoryRow {
                metric: series.name(),
                epoch: observation.epoch,
                value: observation.value,
                recorded_at: observation.recorded_at.to_rfc3339(),
            })?;
        }
    }

    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

impl PlotRenderer for CsvHistoryRenderer {
    fn render(&self, store: &MetricStore) -> Vec<Attachment> {
        if store.is_empty() {
            return Vec::new();
        }

        match history_csv(store) {
            Ok(data) => vec![Attachment::new(self.filename.clone(), "text/csv", data)],
            Err(e) => {
                warn!(error = %e, "Failed to write metric history");
                Vec::new()
            }
        }
    }
}
