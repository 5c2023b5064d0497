//! Event evaluation rules

use tracing::debug;

use crate::config::NotifierConfig;
use crate::error::{Error, Result};
use crate::models::{Event, Recorded, SessionStatus, TrainingFailure, TrainingSession};

/// Operations whose admissibility depends on the session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `start_training`
    Start,
    /// `log_metric` / `log_metrics`
    LogMetrics,
    /// Manual `checkpoint`
    Checkpoint,
    /// `training_complete`
    Complete,
}

impl Operation {
    fn describe(self) -> &'static str {
        match self {
            Operation::Start => "start training",
            Operation::LogMetrics => "log metrics",
            Operation::Checkpoint => "send a checkpoint",
            Operation::Complete => "complete training",
        }
    }
}

/// Result of evaluating the policy: the next status and the events that fired
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Status after the operation
    pub status: SessionStatus,

    /// Events in delivery order
    pub events: Vec<Event>,
}

impl Transition {
    fn stay(session: &TrainingSession, events: Vec<Event>) -> Self {
        Self {
            status: session.status,
            events,
        }
    }

    /// Apply the transition to a session
    pub fn apply(&self, session: &mut TrainingSession) {
        session.status = self.status;
        for event in &self.events {
            if let Event::PeriodicCheckpoint { epoch } = event {
                session.checkpointed_epochs.insert(*epoch);
            }
        }
    }
}

/// Pure decision logic over session state and new observations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPolicy {
    every_n_epochs: i64,
    on_start: bool,
    on_improvement: bool,
    on_complete: bool,
    on_error: bool,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::from_config(&NotifierConfig::default())
    }
}

impl TriggerPolicy {
    /// Build the policy from notifier options
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            every_n_epochs: config.notify_every_n_epochs,
            on_start: config.notify_on_start,
            on_improvement: config.notify_on_improvement,
            on_complete: config.notify_on_complete,
            on_error: config.notify_on_error,
        }
    }

    /// Check that `operation` is allowed in the current status
    ///
    /// Callers run this before mutating anything so that a rejected call
    /// leaves no trace.
    pub fn admit(&self, session: &TrainingSession, operation: Operation) -> Result<()> {
        let status = session.status;
        let allowed = match operation {
            Operation::Start => status == SessionStatus::NotStarted,
            Operation::LogMetrics => !status.is_terminal(),
            Operation::Checkpoint => status != SessionStatus::Errored,
            Operation::Complete => status == SessionStatus::Running,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::invalid_state(operation.describe(), status))
        }
    }

    /// `not_started → running`
    pub fn start(&self, _session: &TrainingSession) -> Transition {
        let events = if self.on_start {
            vec![Event::TrainingStarted]
        } else {
            Vec::new()
        };

        Transition {
            status: SessionStatus::Running,
            events,
        }
    }

    /// Events for a batch of observations recorded at `epoch`
    ///
    /// Improvements come first, in batch order, followed by at most one
    /// periodic checkpoint per epoch value.
    pub fn observe(&self, session: &TrainingSession, recorded: &[Recorded], epoch: u64) -> Transition {
        let mut events = self.improvements(recorded);

        if self.periodic_due(session, epoch) {
            debug!(epoch, interval = self.every_n_epochs, "Periodic checkpoint due");
            events.push(Event::PeriodicCheckpoint { epoch });
        }

        Transition::stay(session, events)
    }

    /// `running → completed`
    pub fn complete(&self, _session: &TrainingSession) -> Transition {
        let events = if self.on_complete {
            vec![Event::TrainingCompleted]
        } else {
            Vec::new()
        };

        Transition {
            status: SessionStatus::Completed,
            events,
        }
    }

    /// Any status except `errored` → `errored`
    ///
    /// Returns `None` when the session already errored: the error event fires
    /// once per session.
    pub fn error(&self, session: &TrainingSession, failure: TrainingFailure) -> Option<Transition> {
        if session.status == SessionStatus::Errored {
            return None;
        }

        let events = if self.on_error {
            vec![Event::TrainingErrored { failure }]
        } else {
            Vec::new()
        };

        Some(Transition {
            status: SessionStatus::Errored,
            events,
        })
    }

    fn improvements(&self, recorded: &[Recorded]) -> Vec<Event> {
        if !self.on_improvement {
            return Vec::new();
        }

        recorded
            .iter()
            .filter(|r| r.improved)
            .map(|r| Event::MetricImproved {
                metric: r.name.clone(),
                value: r.point.value,
                epoch: r.point.epoch,
                previous: r.previous_best,
            })
            .collect()
    }

    fn periodic_due(&self, session: &TrainingSession, epoch: u64) -> bool {
        if self.every_n_epochs <= 0 {
            return false;
        }
        let interval = self.every_n_epochs as u64;
        epoch % interval == 0 && !session.checkpointed_epochs.contains(&epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricPoint;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn policy(every_n: i64) -> TriggerPolicy {
        TriggerPolicy::from_config(&NotifierConfig {
            notify_every_n_epochs: every_n,
            ..Default::default()
        })
    }

    fn running() -> TrainingSession {
        let mut session = TrainingSession::new("test");
        session.status = SessionStatus::Running;
        session
    }

    fn recorded(name: &str, value: f64, epoch: u64, improved: bool) -> Recorded {
        Recorded {
            name: name.to_string(),
            point: MetricPoint { value, epoch },
            improved,
            previous_best: None,
        }
    }

    fn periodic_epochs(policy: &TriggerPolicy, epochs: impl IntoIterator<Item = u64>) -> Vec<u64> {
        let mut session = running();
        let mut fired = Vec::new();
        for epoch in epochs {
            let transition = policy.observe(&session, &[], epoch);
            for event in &transition.events {
                if let Event::PeriodicCheckpoint { epoch } = event {
                    fired.push(*epoch);
                }
            }
            transition.apply(&mut session);
        }
        fired
    }

    #[test]
    fn test_periodic_every_ten_epochs() {
        assert_eq!(periodic_epochs(&policy(10), 1..=25), vec![10, 20]);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(-10)]
    fn test_periodic_disabled(#[case] every_n: i64) {
        assert!(periodic_epochs(&policy(every_n), 0..=50).is_empty());
    }

    #[test]
    fn test_periodic_fires_once_per_epoch() {
        assert_eq!(periodic_epochs(&policy(5), [5, 5, 6, 5, 10]), vec![5, 10]);
    }

    #[test]
    fn test_improvements_before_periodic() {
        let session = running();
        let batch = vec![
            recorded("loss", 0.3, 10, true),
            recorded("accuracy", 0.8, 10, false),
            recorded("f1", 0.7, 10, true),
        ];

        let transition = policy(10).observe(&session, &batch, 10);

        let kinds: Vec<&str> = transition.events.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["metric_improved", "metric_improved", "periodic_checkpoint"]);
        assert_eq!(transition.status, SessionStatus::Running);
    }

    #[test]
    fn test_improvement_notifications_disabled() {
        let policy = TriggerPolicy::from_config(&NotifierConfig {
            notify_on_improvement: false,
            ..Default::default()
        });

        let transition = policy.observe(&running(), &[recorded("loss", 0.1, 1, true)], 1);

        assert!(transition.events.is_empty());
    }

    #[test]
    fn test_admit_rules() {
        let policy = policy(10);
        let mut session = TrainingSession::new("test");

        assert!(policy.admit(&session, Operation::Start).is_ok());
        assert!(policy.admit(&session, Operation::LogMetrics).is_ok());
        assert!(matches!(
            policy.admit(&session, Operation::Complete),
            Err(Error::InvalidState {
                status: SessionStatus::NotStarted,
                ..
            })
        ));

        session.status = SessionStatus::Running;
        assert!(policy.admit(&session, Operation::Start).is_err());
        assert!(policy.admit(&session, Operation::Complete).is_ok());

        session.status = SessionStatus::Completed;
        assert!(policy.admit(&session, Operation::LogMetrics).is_err());
        assert!(policy.admit(&session, Operation::Complete).is_err());
        assert!(policy.admit(&session, Operation::Checkpoint).is_ok());

        session.status = SessionStatus::Errored;
        assert!(policy.admit(&session, Operation::LogMetrics).is_err());
        assert!(policy.admit(&session, Operation::Checkpoint).is_err());
    }

    #[test]
    fn test_complete_fires_only_completion() {
        let transition = policy(10).complete(&running());

        let kinds: Vec<&str> = transition.events.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["training_completed"]);
        assert_eq!(transition.status, SessionStatus::Completed);
    }

    #[test]
    fn test_complete_without_notification_still_transitions() {
        let policy = TriggerPolicy::from_config(&NotifierConfig {
            notify_on_complete: false,
            ..Default::default()
        });

        let transition = policy.complete(&running());

        assert!(transition.events.is_empty());
        assert_eq!(transition.status, SessionStatus::Completed);
    }

    #[test]
    fn test_error_fires_once() {
        let policy = policy(10);
        let mut session = TrainingSession::new("test");

        let transition = policy.error(&session, TrainingFailure::new("boom")).unwrap();
        assert_eq!(transition.status, SessionStatus::Errored);
        assert_eq!(transition.events.len(), 1);
        transition.apply(&mut session);

        assert!(policy.error(&session, TrainingFailure::new("again")).is_none());
    }

    #[test]
    fn test_error_without_notification_still_transitions() {
        let policy = TriggerPolicy::from_config(&NotifierConfig {
            notify_on_error: false,
            ..Default::default()
        });

        let transition = policy.error(&running(), TrainingFailure::new("boom")).unwrap();

        assert_eq!(transition.status, SessionStatus::Errored);
        assert!(transition.events.is_empty());
    }
}
