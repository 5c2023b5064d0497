//! Training session state

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::metrics::MetricStore;

/// Opaque training configuration echoed in the start message
pub type TrainingConfig = serde_json::Map<String, serde_json::Value>;

/// Named values passed to `checkpoint` and `training_complete`
///
/// Numbers are shown with six decimals; other values are shown as given.
pub type MetricValues = serde_json::Map<String, serde_json::Value>;

/// Lifecycle status of a training session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// `start_training` has not been called
    #[default]
    NotStarted,
    /// Training is in progress
    Running,
    /// Training finished normally
    Completed,
    /// Training failed
    Errored,
}

impl SessionStatus {
    /// Completed and errored sessions accept no further metric updates
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Errored)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Errored => "errored",
        };
        f.write_str(text)
    }
}

/// Aggregate state of one training run
#[derive(Debug)]
pub struct TrainingSession {
    /// Identifier of this run, regenerated on reset
    pub run_id: Uuid,

    /// Human-readable training name
    pub name: String,

    /// Configuration passed to `start_training`
    pub config: TrainingConfig,

    /// Current lifecycle status
    pub status: SessionStatus,

    /// Epoch of the most recent metric report
    pub last_epoch: Option<u64>,

    /// Epochs for which a periodic checkpoint already fired
    pub checkpointed_epochs: BTreeSet<u64>,

    /// Metric history and best-value bookkeeping
    pub store: MetricStore,
}

impl TrainingSession {
    /// Create a fresh, not-started session
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            name: name.into(),
            config: TrainingConfig::new(),
            status: SessionStatus::NotStarted,
            last_epoch: None,
            checkpointed_epochs: BTreeSet::new(),
            store: MetricStore::new(),
        }
    }

    /// Elapsed time formatted for humans, e.g. "8h 14m 35s"
    pub fn elapsed_human(&self) -> String {
        let whole = std::time::Duration::from_secs(self.store.elapsed().as_secs());
        humantime::format_duration(whole).to_string()
    }
}
