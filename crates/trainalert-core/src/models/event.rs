//! Notification events

use serde::{Deserialize, Serialize};
use std::fmt;

use super::metrics::BestRecord;

/// Something worth telling a human about
///
/// Events are produced by the trigger policy and consumed immediately by the
/// notifier; they are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// `start_training` was called
    TrainingStarted,
    /// An epoch hit the configured checkpoint interval
    PeriodicCheckpoint { epoch: u64 },
    /// `checkpoint` was called explicitly
    ManualCheckpoint { note: String },
    /// A metric reached a new best value
    MetricImproved {
        metric: String,
        value: f64,
        epoch: u64,
        previous: Option<BestRecord>,
    },
    /// `training_complete` was called
    TrainingCompleted,
    /// `on_error` was called
    TrainingErrored { failure: TrainingFailure },
}

impl Event {
    /// Ranking used to pick the subject of a composed message
    pub fn significance(&self) -> u8 {
        match self {
            Event::TrainingStarted => 0,
            Event::MetricImproved { .. } => 1,
            Event::PeriodicCheckpoint { .. } | Event::ManualCheckpoint { .. } => 2,
            Event::TrainingCompleted => 3,
            Event::TrainingErrored { .. } => 4,
        }
    }

    /// Short machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TrainingStarted => "training_started",
            Event::PeriodicCheckpoint { .. } => "periodic_checkpoint",
            Event::ManualCheckpoint { .. } => "manual_checkpoint",
            Event::MetricImproved { .. } => "metric_improved",
            Event::TrainingCompleted => "training_completed",
            Event::TrainingErrored { .. } => "training_errored",
        }
    }

    /// Whether metric-history attachments belong with this event
    pub fn wants_plots(&self) -> bool {
        matches!(
            self,
            Event::PeriodicCheckpoint { .. } | Event::ManualCheckpoint { .. } | Event::TrainingCompleted
        )
    }
}

/// Description of a failure reported through `on_error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingFailure {
    /// Top-level error message
    pub message: String,

    /// Messages of the underlying causes, outermost first
    pub causes: Vec<String>,

    /// Rendered backtrace or traceback, if the caller captured one
    pub trace: Option<String>,
}

impl TrainingFailure {
    /// Failure with a plain message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            trace: None,
        }
    }

    /// Capture an error together with its `source()` chain
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            causes,
            trace: None,
        }
    }

    /// Attach a rendered trace
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl fmt::Display for TrainingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&str> for TrainingFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for TrainingFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for TrainingFailure {
    fn from(error: anyhow::Error) -> Self {
        let mut chain = error.chain().map(ToString::to_string);
        let message = chain.next().unwrap_or_default();
        let backtrace = error.backtrace();
        let trace = (backtrace.status() == std::backtrace::BacktraceStatus::Captured)
            .then(|| backtrace.to_string());

        Self {
            message,
            causes: chain.collect(),
            trace,
        }
    }
}
