//! Training notifier facade
//!
//! [`TrainingNotifier`] is the single entry point a training loop talks to.
//! Every call runs "record, evaluate, compose" as one critical section over
//! the session, then delivers the composed message outside the lock.
//!
//! ```no_run
//! # async fn run() -> trainalert::Result<()> {
//! use trainalert::{Config, TrainingNotifier};
//!
//! let notifier = TrainingNotifier::from_config(&Config::default())?;
//! notifier.start_training(Default::default()).await?;
//! for epoch in 1..=100 {
//!     let loss = 1.0 / epoch as f64;
//!     notifier.log_metrics([("loss", loss)], epoch).await?;
//! }
//! notifier.training_complete(None).await?;
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, NotifierConfig};
use crate::dispatch::{ChannelDispatcher, DispatchReport};
use crate::error::Result;
use crate::models::{
    BestRecord, Direction, Event, Message, MetricValues, SessionStatus, StoreSummary,
    TrainingConfig, TrainingFailure, TrainingSession,
};
use crate::render::{CsvHistoryRenderer, PlotRenderer, Renderer, TextRenderer};
use crate::system::{HostInfoCollector, SystemInfoCollector, SystemSnapshot};
use crate::trigger::{Operation, TriggerPolicy};

/// What one facade call fired and how delivery went
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationOutcome {
    /// Events that fired, in delivery order
    pub events: Vec<Event>,

    /// The composed message, when any event fired
    pub message: Option<Message>,

    /// Per-channel results, when a message was dispatched
    pub report: Option<DispatchReport>,
}

impl NotificationOutcome {
    /// Whether no event fired
    pub fn is_silent(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether a message went out and every channel accepted it
    pub fn delivered(&self) -> bool {
        self.report.as_ref().is_some_and(DispatchReport::all_ok)
    }
}

/// Inputs to rendering that do not live in the session
#[derive(Default)]
struct RenderContext<'a> {
    system: Option<&'a SystemSnapshot>,
    checkpoint_metrics: Option<&'a MetricValues>,
    final_metrics: Option<&'a MetricValues>,
}

/// Events and their composed message, awaiting dispatch
struct Pending {
    events: Vec<Event>,
    message: Option<Message>,
}

/// Orchestrates metric tracking, trigger evaluation and channel fan-out
pub struct TrainingNotifier {
    options: NotifierConfig,
    policy: TriggerPolicy,
    session: Mutex<TrainingSession>,
    dispatcher: ChannelDispatcher,
    renderer: Arc<dyn Renderer>,
    plots: Option<Arc<dyn PlotRenderer>>,
    system_info: Arc<dyn SystemInfoCollector>,
}

impl std::fmt::Debug for TrainingNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingNotifier")
            .field("options", &self.options)
            .field("policy", &self.policy)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl TrainingNotifier {
    /// Create a notifier over an already built dispatcher
    pub fn new(options: NotifierConfig, dispatcher: ChannelDispatcher) -> Self {
        let plots: Option<Arc<dyn PlotRenderer>> = if options.include_plots {
            Some(Arc::new(CsvHistoryRenderer::new()))
        } else {
            None
        };

        info!(
            training = %options.training_name,
            channels = ?dispatcher.channel_names(),
            "TrainAlert initialized"
        );

        Self {
            policy: TriggerPolicy::from_config(&options),
            session: Mutex::new(fresh_session(&options)),
            dispatcher,
            renderer: Arc::new(TextRenderer::new()),
            plots,
            system_info: Arc::new(HostInfoCollector::new()),
            options,
        }
    }

    /// Create a notifier and its channels from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let dispatcher =
            ChannelDispatcher::from_config(&config.channels, config.notifier.delivery_timeout)?;
        Ok(Self::new(config.notifier.clone(), dispatcher))
    }

    /// Replace the message renderer
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the attachment renderer; `None` disables attachments
    pub fn with_plot_renderer(mut self, plots: Option<Arc<dyn PlotRenderer>>) -> Self {
        self.plots = plots;
        self
    }

    /// Replace the system-info collector
    pub fn with_system_info(mut self, collector: Arc<dyn SystemInfoCollector>) -> Self {
        self.system_info = collector;
        self
    }

    /// Mark training as started and announce it
    ///
    /// `config` is echoed in the start message. Fails with
    /// [`crate::Error::InvalidState`] unless the session is not started.
    pub async fn start_training(&self, config: TrainingConfig) -> Result<NotificationOutcome> {
        let system = if self.options.notify_on_start {
            self.system_snapshot().await
        } else {
            None
        };

        let pending = {
            let mut session = self.session.lock();
            self.policy.admit(&session, Operation::Start)?;

            session.config = config;
            session.store.restart_clock();
            let transition = self.policy.start(&session);
            transition.apply(&mut session);
            info!(training = %session.name, run_id = %session.run_id, "Training started");

            let context = RenderContext {
                system: system.as_ref(),
                ..Default::default()
            };
            self.compose(&session, transition.events, &context)
        };

        Ok(self.deliver(pending).await)
    }

    /// Record one metric value
    pub async fn log_metric(&self, name: &str, value: f64, epoch: u64) -> Result<NotificationOutcome> {
        self.log_metrics([(name, value)], epoch).await
    }

    /// Record several metric values reported at the same epoch
    ///
    /// The batch is recorded all-or-nothing: a NaN or infinite value fails the
    /// call with [`crate::Error::InvalidMetric`] and nothing is stored. All
    /// events of the batch go out as one message.
    pub async fn log_metrics<I, K>(&self, metrics: I, epoch: u64) -> Result<NotificationOutcome>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let entries: Vec<(String, f64)> = metrics
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();

        let pending = {
            let mut session = self.session.lock();
            self.policy.admit(&session, Operation::LogMetrics)?;

            let recorded = session.store.record_many(&entries, epoch)?;
            session.last_epoch = Some(epoch);
            debug!(epoch, metrics = entries.len(), "Metrics recorded");

            let transition = self.policy.observe(&session, &recorded, epoch);
            transition.apply(&mut session);
            self.compose(&session, transition.events, &RenderContext::default())
        };

        Ok(self.deliver(pending).await)
    }

    /// Send a checkpoint message right away
    ///
    /// Without `metrics` the latest value of every tracked metric is shown.
    /// Rejected only once the session errored.
    pub async fn checkpoint(
        &self,
        note: impl Into<String>,
        metrics: Option<MetricValues>,
    ) -> Result<NotificationOutcome> {
        let note = note.into();

        let pending = {
            let session = self.session.lock();
            self.policy.admit(&session, Operation::Checkpoint)?;

            let context = RenderContext {
                checkpoint_metrics: metrics.as_ref(),
                ..Default::default()
            };
            self.compose(&session, vec![Event::ManualCheckpoint { note }], &context)
        };

        Ok(self.deliver(pending).await)
    }

    /// Mark training as completed and send the summary
    ///
    /// `final_metrics` are only shown in the completion message; they are not
    /// recorded as observations.
    pub async fn training_complete(
        &self,
        final_metrics: Option<MetricValues>,
    ) -> Result<NotificationOutcome> {
        let final_metrics = final_metrics.unwrap_or_default();

        let system = if self.options.notify_on_complete {
            self.system_snapshot().await
        } else {
            None
        };

        let pending = {
            let mut session = self.session.lock();
            self.policy.admit(&session, Operation::Complete)?;

            let transition = self.policy.complete(&session);
            transition.apply(&mut session);
            info!(
                training = %session.name,
                elapsed = %session.elapsed_human(),
                "Training completed"
            );

            let context = RenderContext {
                system: system.as_ref(),
                final_metrics: Some(&final_metrics),
                ..Default::default()
            };
            self.compose(&session, transition.events, &context)
        };

        Ok(self.deliver(pending).await)
    }

    /// Report a training failure
    ///
    /// Always moves the session to errored and never fails; delivery problems
    /// are only logged. A second call after the session errored does nothing.
    pub async fn on_error(&self, failure: impl Into<TrainingFailure>) -> NotificationOutcome {
        let failure = failure.into();

        let pending = {
            let mut session = self.session.lock();
            error!(training = %session.name, error = %failure, "Training failed");

            let Some(transition) = self.policy.error(&session, failure) else {
                debug!("Session already errored, ignoring");
                return NotificationOutcome::default();
            };
            transition.apply(&mut session);
            self.compose(&session, transition.events, &RenderContext::default())
        };

        self.deliver(pending).await
    }

    /// Fix the comparison direction of a metric
    pub fn set_direction(&self, name: &str, direction: Direction) -> Result<()> {
        self.session.lock().store.set_direction(name, direction)
    }

    /// Discard all state and return to "not started"
    ///
    /// Metric history, best records and checkpoint bookkeeping are cleared;
    /// the run gets a new id and a fresh clock.
    pub fn reset(&self) {
        let mut session = self.session.lock();
        *session = fresh_session(&self.options);
        info!(training = %session.name, run_id = %session.run_id, "Session reset");
    }

    /// Latest and best value of every metric
    pub fn summary(&self) -> StoreSummary {
        self.session.lock().store.summary()
    }

    /// Current session status
    pub fn status(&self) -> SessionStatus {
        self.session.lock().status
    }

    /// Best record of a metric
    pub fn best(&self, name: &str) -> Option<BestRecord> {
        self.session.lock().store.best(name)
    }

    /// Time since training started
    pub fn elapsed(&self) -> Duration {
        self.session.lock().store.elapsed()
    }

    /// Identifier of the current run
    pub fn run_id(&self) -> Uuid {
        self.session.lock().run_id
    }

    /// Names of the enabled channels
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.dispatcher.channel_names()
    }

    /// Deliver an arbitrary message to every channel
    pub async fn send(&self, message: &Message) -> DispatchReport {
        self.dispatcher.dispatch(message).await
    }

    fn compose(&self, session: &TrainingSession, events: Vec<Event>, context: &RenderContext<'_>) -> Pending {
        if events.is_empty() {
            return Pending {
                events,
                message: None,
            };
        }

        let summary = session.store.summary();
        let sections: Vec<Message> = events
            .iter()
            .map(|event| self.render_event(session, event, &summary, context))
            .collect();

        // First of the most significant events names the message
        let lead = (0..events.len()).fold(0, |lead, i| {
            if events[i].significance() > events[lead].significance() {
                i
            } else {
                lead
            }
        });
        let mut message = Message::compose(sections[lead].subject.clone(), sections);

        if events.iter().any(Event::wants_plots) {
            if let Some(plots) = &self.plots {
                message.attachments.extend(plots.render(&session.store));
            }
        }
        message.html = self.renderer.render_html(&message, !message.attachments.is_empty());

        Pending {
            events,
            message: Some(message),
        }
    }

    fn render_event(
        &self,
        session: &TrainingSession,
        event: &Event,
        summary: &StoreSummary,
        context: &RenderContext<'_>,
    ) -> Message {
        match event {
            Event::TrainingStarted => self.renderer.render_start(session, context.system),
            Event::PeriodicCheckpoint { epoch } => {
                self.renderer.render_periodic(session, *epoch, summary)
            }
            Event::ManualCheckpoint { note } => match context.checkpoint_metrics {
                Some(metrics) => self.renderer.render_checkpoint(session, note, metrics),
                None => {
                    let latest: MetricValues = summary
                        .latest_values()
                        .into_iter()
                        .map(|(name, value)| (name, serde_json::Value::from(value)))
                        .collect();
                    self.renderer.render_checkpoint(session, note, &latest)
                }
            },
            Event::MetricImproved {
                metric,
                value,
                epoch,
                previous,
            } => self.renderer.render_improvement(
                session,
                metric,
                *value,
                *epoch,
                *previous,
                session.store.direction_of(metric),
            ),
            Event::TrainingCompleted => {
                let empty = MetricValues::new();
                self.renderer.render_completion(
                    session,
                    summary,
                    context.final_metrics.unwrap_or(&empty),
                    context.system,
                )
            }
            Event::TrainingErrored { failure } => self.renderer.render_error(session, failure),
        }
    }

    async fn deliver(&self, pending: Pending) -> NotificationOutcome {
        let Pending { events, message } = pending;

        let report = match &message {
            Some(message) if !self.dispatcher.is_empty() => {
                let report = self.dispatcher.dispatch(message).await;
                for (channel, e) in report.failures() {
                    debug!(channel, error = %e, subject = %message.subject, "Delivery failure recorded");
                }
                Some(report)
            }
            Some(message) => {
                debug!(subject = %message.subject, "No channels enabled, message not sent");
                None
            }
            None => None,
        };

        NotificationOutcome {
            events,
            message,
            report,
        }
    }

    async fn system_snapshot(&self) -> Option<SystemSnapshot> {
        if !self.options.include_system_info {
            return None;
        }

        let collector = Arc::clone(&self.system_info);
        match tokio::task::spawn_blocking(move || collector.snapshot()).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "System info collection failed");
                None
            }
        }
    }
}

fn fresh_session(options: &NotifierConfig) -> TrainingSession {
    let mut session = TrainingSession::new(options.training_name.clone());
    for (name, direction) in &options.metric_directions {
        if let Err(e) = session.store.set_direction(name, *direction) {
            warn!(metric = %name, error = %e, "Ignoring direction override");
        }
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{Channel, SlackChannel};
    use crate::config::SlackConfig;
    use crate::error::Error;
    use crate::models::MetricPoint;
    use crate::system::CpuInfo;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(every_n: i64) -> NotifierConfig {
        NotifierConfig {
            training_name: "mnist".to_string(),
            notify_every_n_epochs: every_n,
            ..Default::default()
        }
    }

    fn fixed_system() -> Arc<dyn SystemInfoCollector> {
        Arc::new(SystemSnapshot {
            platform: "linux".to_string(),
            cpu: CpuInfo {
                architecture: "x86_64".to_string(),
                logical_cores: 4,
            },
            memory: None,
            gpus: Vec::new(),
        })
    }

    fn notifier(options: NotifierConfig) -> TrainingNotifier {
        TrainingNotifier::new(options, ChannelDispatcher::new(Vec::new(), Duration::from_secs(5)))
            .with_system_info(fixed_system())
    }

    fn slack_notifier(options: NotifierConfig, server: &MockServer) -> TrainingNotifier {
        let slack = SlackChannel::configure(
            &SlackConfig {
                webhook_url: Some(format!("{}/hook", server.uri())),
                ..Default::default()
            },
            reqwest::Client::new(),
        )
        .unwrap();
        let dispatcher = ChannelDispatcher::new(vec![Channel::Slack(slack)], Duration::from_secs(5));
        TrainingNotifier::new(options, dispatcher).with_system_info(fixed_system())
    }

    fn kinds(outcome: &NotificationOutcome) -> Vec<&'static str> {
        outcome.events.iter().map(Event::kind).collect()
    }

    #[tokio::test]
    async fn test_improvement_scenario() {
        let notifier = notifier(options(0));
        notifier.start_training(TrainingConfig::new()).await.unwrap();

        let first = notifier.log_metric("loss", 0.5, 1).await.unwrap();
        let second = notifier.log_metric("loss", 0.6, 2).await.unwrap();
        let third = notifier.log_metric("loss", 0.3, 3).await.unwrap();

        assert_eq!(kinds(&first), vec!["metric_improved"]);
        assert!(second.is_silent());
        assert_eq!(kinds(&third), vec!["metric_improved"]);
        assert_eq!(notifier.best("loss"), Some(MetricPoint { value: 0.3, epoch: 3 }));

        let message = third.message.unwrap();
        assert!(message.body.contains("Epoch 3: 0.500000 → 0.300000"));
        assert!(third.report.is_none());
    }

    #[tokio::test]
    async fn test_periodic_checkpoint_attaches_history() {
        let notifier = notifier(options(10));
        notifier.start_training(TrainingConfig::new()).await.unwrap();

        let mut periodic = Vec::new();
        for epoch in 1..=25 {
            let loss = 1.0 + epoch as f64;
            let outcome = notifier.log_metric("loss", loss, epoch).await.unwrap();
            if outcome.events.iter().any(|e| e.kind() == "periodic_checkpoint") {
                let message = outcome.message.unwrap();
                assert_eq!(message.subject, "📍 mnist - Checkpoint");
                assert_eq!(message.attachments[0].filename, "metrics.csv");
                assert!(message.html.unwrap().contains("Metric history is attached"));
                periodic.push(epoch);
            }
        }

        assert_eq!(periodic, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_complete_before_start_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let notifier = slack_notifier(options(10), &server);

        let result = notifier.training_complete(None).await;

        assert!(matches!(
            result,
            Err(Error::InvalidState {
                status: SessionStatus::NotStarted,
                ..
            })
        ));
        assert_eq!(notifier.status(), SessionStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_no_metrics_after_completion() {
        let notifier = notifier(options(10));
        notifier.start_training(TrainingConfig::new()).await.unwrap();
        notifier.log_metric("loss", 0.5, 1).await.unwrap();
        notifier.training_complete(None).await.unwrap();

        let result = notifier.log_metric("loss", 0.1, 2).await;

        assert!(matches!(result, Err(Error::InvalidState { .. })));
        let summary = notifier.summary();
        assert_eq!(summary.metrics["loss"].count, 1);
        assert_eq!(notifier.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_invalid_batch_records_nothing() {
        let notifier = notifier(options(1));
        notifier.start_training(TrainingConfig::new()).await.unwrap();

        let result = notifier
            .log_metrics([("loss", 0.4), ("accuracy", f64::NAN)], 1)
            .await;

        assert!(matches!(result, Err(Error::InvalidMetric { .. })));
        assert!(notifier.summary().is_empty());

        // The epoch was never seen, so its checkpoint is still due
        let retry = notifier.log_metrics([("loss", 0.4)], 1).await.unwrap();
        assert_eq!(kinds(&retry), vec!["metric_improved", "periodic_checkpoint"]);
    }

    #[tokio::test]
    async fn test_batch_improvements_share_one_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let notifier = slack_notifier(options(0), &server);

        let outcome = notifier
            .log_metrics([("loss", 0.4), ("accuracy", 0.7)], 1)
            .await
            .unwrap();

        assert_eq!(kinds(&outcome), vec!["metric_improved", "metric_improved"]);
        assert!(outcome.delivered());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_final_metrics_are_shown_not_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;
        let notifier = slack_notifier(
            NotifierConfig {
                notify_on_start: false,
                ..options(0)
            },
            &server,
        );
        notifier.start_training(TrainingConfig::new()).await.unwrap();
        notifier
            .log_metrics([("loss", 0.4), ("accuracy", 0.8)], 50)
            .await
            .unwrap();
        let before = notifier.summary();

        let final_metrics = json!({
            "final_loss": 0.3,
            "final_accuracy": 0.9,
            "best_accuracy": 0.95,
            "checkpoint": "best.pt"
        })
        .as_object()
        .cloned()
        .unwrap();
        let outcome = notifier.training_complete(Some(final_metrics)).await.unwrap();

        assert_eq!(kinds(&outcome), vec!["training_completed"]);
        assert_eq!(notifier.summary(), before);
        assert_eq!(notifier.best("final_loss"), None);

        let message = outcome.message.as_ref().unwrap();
        assert_eq!(message.subject, "✅ mnist - Complete!");
        assert!(!message.body.contains("Improved!"));
        assert!(message.body.contains("final_loss: 0.300000"));
        assert!(message.body.contains("checkpoint: best.pt"));
        assert!(message.body.contains("System Information:"));
        assert!(outcome.delivered());
    }

    #[tokio::test]
    async fn test_on_error_fires_once() {
        let notifier = notifier(options(10));
        notifier.start_training(TrainingConfig::new()).await.unwrap();
        notifier.log_metric("loss", 0.5, 1).await.unwrap();

        let first = notifier.on_error("CUDA out of memory").await;
        let second = notifier.on_error("again").await;

        assert_eq!(kinds(&first), vec!["training_errored"]);
        assert_eq!(first.message.unwrap().subject, "❌ mnist - Error!");
        assert!(second.is_silent());
        assert_eq!(notifier.status(), SessionStatus::Errored);

        let before = notifier.summary();
        assert!(matches!(
            notifier.log_metric("loss", 0.1, 2).await,
            Err(Error::InvalidState {
                status: SessionStatus::Errored,
                ..
            })
        ));
        assert!(matches!(
            notifier.log_metrics([("loss", 0.05), ("accuracy", 0.9)], 3).await,
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(notifier.summary(), before);
        assert_eq!(notifier.best("loss"), Some(MetricPoint { value: 0.5, epoch: 1 }));
        assert!(matches!(
            notifier.checkpoint("after", None).await,
            Err(Error::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_tied_value_is_silent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let notifier = slack_notifier(
            NotifierConfig {
                notify_on_start: false,
                ..options(0)
            },
            &server,
        );
        notifier.start_training(TrainingConfig::new()).await.unwrap();
        notifier.log_metric("accuracy", 0.9, 1).await.unwrap();

        let tie = notifier.log_metric("accuracy", 0.9, 2).await.unwrap();

        assert!(tie.is_silent());
        assert!(tie.message.is_none());
        assert!(tie.report.is_none());
        assert_eq!(notifier.best("accuracy"), Some(MetricPoint { value: 0.9, epoch: 1 }));
    }

    #[tokio::test]
    async fn test_on_error_swallows_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let notifier = slack_notifier(options(10), &server);

        let outcome = notifier.on_error(anyhow::anyhow!("loader crashed")).await;

        assert_eq!(kinds(&outcome), vec!["training_errored"]);
        assert!(!outcome.delivered());
        assert_eq!(notifier.status(), SessionStatus::Errored);
    }

    #[tokio::test]
    async fn test_error_notification_disabled() {
        let notifier = notifier(NotifierConfig {
            notify_on_error: false,
            ..options(10)
        });

        let outcome = notifier.on_error("boom").await;

        assert!(outcome.is_silent());
        assert_eq!(notifier.status(), SessionStatus::Errored);
    }

    #[tokio::test]
    async fn test_manual_checkpoint_always_fires() {
        let notifier = notifier(NotifierConfig {
            notify_on_start: false,
            notify_on_improvement: false,
            include_plots: false,
            ..options(0)
        });
        notifier.start_training(TrainingConfig::new()).await.unwrap();
        notifier.log_metric("loss", 0.25, 3).await.unwrap();

        let outcome = notifier.checkpoint("halfway there", None).await.unwrap();

        assert_eq!(kinds(&outcome), vec!["manual_checkpoint"]);
        let message = outcome.message.unwrap();
        assert!(message.body.contains("Checkpoint: halfway there"));
        assert!(message.body.contains("loss: 0.250000"));
        assert!(message.attachments.is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let notifier = notifier(options(10));
        let config = json!({ "lr": 0.01 }).as_object().cloned().unwrap();

        let outcome = notifier.start_training(config).await.unwrap();
        assert_eq!(kinds(&outcome), vec!["training_started"]);
        assert!(outcome.message.unwrap().body.contains("lr: 0.010000"));

        assert!(notifier.start_training(TrainingConfig::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_metric_direction_override() {
        let mut options = options(0);
        options
            .metric_directions
            .insert("error_budget".to_string(), Direction::Maximize);
        let notifier = notifier(options);

        notifier.log_metric("error_budget", 0.5, 1).await.unwrap();
        let outcome = notifier.log_metric("error_budget", 0.6, 2).await.unwrap();

        assert_eq!(kinds(&outcome), vec!["metric_improved"]);
        assert!(matches!(
            notifier.set_direction("error_budget", Direction::Minimize),
            Err(Error::DirectionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_session() {
        let notifier = notifier(options(10));
        notifier.start_training(TrainingConfig::new()).await.unwrap();
        notifier.log_metric("loss", 0.5, 1).await.unwrap();
        notifier.on_error("boom").await;
        let old_run = notifier.run_id();

        notifier.reset();

        assert_eq!(notifier.status(), SessionStatus::NotStarted);
        assert!(notifier.summary().is_empty());
        assert_ne!(notifier.run_id(), old_run);
        assert!(notifier.start_training(TrainingConfig::new()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logging_keeps_true_best() {
        let notifier = Arc::new(notifier(options(0)));
        notifier.start_training(TrainingConfig::new()).await.unwrap();

        let tasks: Vec<_> = (1..=50u64)
            .map(|epoch| {
                let notifier = Arc::clone(&notifier);
                tokio::spawn(async move {
                    let loss = ((epoch * 37) % 50) as f64 + 1.0;
                    notifier.log_metric("loss", loss, epoch).await.unwrap()
                })
            })
            .collect();

        let mut improvements = 0;
        for task in tasks {
            improvements += task.await.unwrap().events.len();
        }

        assert_eq!(notifier.best("loss").map(|b| b.value), Some(1.0));
        assert_eq!(notifier.summary().metrics["loss"].count, 50);
        assert!(improvements >= 1);
    }
}
