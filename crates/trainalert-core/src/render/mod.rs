//! Message rendering
//!
//! The notifier decides *when* to send; renderers decide *what* the message
//! says. Each event is rendered into its own [`Message`] section and the
//! notifier composes the sections of one call into a single message.

mod html;
mod plot;
mod text;

pub use html::html_email;
pub use plot::CsvHistoryRenderer;
pub use text::TextRenderer;

use crate::metrics::MetricStore;
use crate::models::{
    Attachment, BestRecord, Direction, Message, MetricValues, StoreSummary, TrainingFailure,
    TrainingSession,
};
use crate::system::SystemSnapshot;

/// Turns events into human-readable messages
pub trait Renderer: Send + Sync {
    /// Training started, with the echoed configuration
    fn render_start(&self, session: &TrainingSession, system: Option<&SystemSnapshot>) -> Message;

    /// Periodic checkpoint at `epoch`
    fn render_periodic(&self, session: &TrainingSession, epoch: u64, summary: &StoreSummary) -> Message;

    /// Manual checkpoint with the caller's note and metrics
    fn render_checkpoint(&self, session: &TrainingSession, note: &str, metrics: &MetricValues) -> Message;

    /// A metric reached a new best value
    fn render_improvement(
        &self,
        session: &TrainingSession,
        metric: &str,
        value: f64,
        epoch: u64,
        previous: Option<BestRecord>,
        direction: Direction,
    ) -> Message;

    /// Training finished
    fn render_completion(
        &self,
        session: &TrainingSession,
        summary: &StoreSummary,
        final_metrics: &MetricValues,
        system: Option<&SystemSnapshot>,
    ) -> Message;

    /// Training failed
    fn render_error(&self, session: &TrainingSession, failure: &TrainingFailure) -> Message;

    /// HTML rendition of a composed message, used by e-mail
    fn render_html(&self, message: &Message, has_attachments: bool) -> Option<String> {
        Some(html_email(&message.subject, &message.body, has_attachments))
    }
}

/// Builds attachments from the metric history
pub trait PlotRenderer: Send + Sync {
    /// Attachments for the current history; empty when there is nothing to plot
    fn render(&self, store: &MetricStore) -> Vec<Attachment>;
}
