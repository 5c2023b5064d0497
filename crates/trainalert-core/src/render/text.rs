//! Plain-text message formats

use chrono::Local;
use serde_json::Value;
use std::fmt::Write as _;

use super::Renderer;
use crate::models::{
    BestRecord, Direction, Message, MetricValues, StoreSummary, TrainingFailure, TrainingSession,
};
use crate::system::SystemSnapshot;

/// Default renderer: emoji-prefixed subjects, six-decimal metric values
#[derive(Debug, Clone, Default)]
pub struct TextRenderer;

impl TextRenderer {
    /// Create a text renderer
    pub fn new() -> Self {
        Self
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => format!("{f:.6}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `val_loss` → `Val_Loss`
fn title_case(name: &str) -> String {
    let mut titled = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                titled.extend(c.to_uppercase());
            } else {
                titled.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            titled.push(c);
            at_word_start = true;
        }
    }
    titled
}

fn push_values(body: &mut String, heading: &str, values: &MetricValues) {
    if values.is_empty() {
        return;
    }
    let _ = write!(body, "\n{heading}:");
    for (key, value) in values {
        let _ = write!(body, "\n  {key}: {}", format_value(value));
    }
}

fn push_system(body: &mut String, system: Option<&SystemSnapshot>) {
    if let Some(system) = system {
        let _ = write!(body, "\n\n{system}");
    }
}

impl Renderer for TextRenderer {
    fn render_start(&self, session: &TrainingSession, system: Option<&SystemSnapshot>) -> Message {
        let mut body = format!(
            "🚀 Training Started: {}\nTime: {}\n",
            session.name,
            timestamp()
        );
        push_values(&mut body, "Configuration", &session.config);
        push_system(&mut body, system);

        Message::new("🚀 Training Started", body.trim_end())
    }

    fn render_periodic(&self, session: &TrainingSession, epoch: u64, summary: &StoreSummary) -> Message {
        let metrics: MetricValues = summary
            .latest_values()
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect();
        self.render_checkpoint(session, &format!("Epoch {epoch} completed"), &metrics)
    }

    fn render_checkpoint(&self, session: &TrainingSession, note: &str, metrics: &MetricValues) -> Message {
        let mut body = format!("📍 Checkpoint: {note}\nTime: {}\n", timestamp());
        push_values(&mut body, "Current Metrics", metrics);

        Message::new(format!("📍 {} - Checkpoint", session.name), body.trim_end())
    }

    fn render_improvement(
        &self,
        _session: &TrainingSession,
        metric: &str,
        value: f64,
        epoch: u64,
        previous: Option<BestRecord>,
        direction: Direction,
    ) -> Message {
        let marker = match direction {
            Direction::Minimize => "📉",
            Direction::Maximize => "📈",
        };
        let title = title_case(metric);

        let mut body = format!("{marker} {title} Improved!\n");
        match previous {
            Some(previous) => {
                let change = value - previous.value;
                let verb = if change < 0.0 { "decreased" } else { "increased" };
                let _ = write!(
                    body,
                    "Epoch {epoch}: {:.6} → {value:.6}\n({verb} by {:.6})",
                    previous.value,
                    change.abs()
                );
            }
            None => {
                let _ = write!(body, "Epoch {epoch}: {value:.6}");
            }
        }

        Message::new(format!("📈 {title} Improved!"), body)
    }

    fn render_completion(
        &self,
        session: &TrainingSession,
        summary: &StoreSummary,
        final_metrics: &MetricValues,
        system: Option<&SystemSnapshot>,
    ) -> Message {
        let mut body = format!(
            "✅ Training Complete: {}\nTime: {}\n\nSummary:\n  Total Epochs: {}\n  Training Time: {}\n",
            session.name,
            timestamp(),
            summary.total_epochs,
            session.elapsed_human()
        );

        if !summary.is_empty() {
            body.push_str("\nMetrics Summary:");
            for (name, series) in &summary.metrics {
                let _ = write!(
                    body,
                    "\n  {name}:\n    Latest: {:.6}\n    Best: {:.6} (epoch {})",
                    series.latest.value, series.best.value, series.best.epoch
                );
            }
            body.push('\n');
        }

        push_values(&mut body, "Final Metrics", final_metrics);
        push_system(&mut body, system);

        Message::new(format!("✅ {} - Complete!", session.name), body.trim_end())
    }

    fn render_error(&self, session: &TrainingSession, failure: &TrainingFailure) -> Message {
        let mut body = format!(
            "❌ Training Error Occurred\nTime: {}\n\nError: {}",
            timestamp(),
            failure.message
        );

        if !failure.causes.is_empty() {
            body.push_str("\n\nCaused by:");
            for (i, cause) in failure.causes.iter().enumerate() {
                let _ = write!(body, "\n  {i}: {cause}");
            }
        }
        if let Some(trace) = &failure.trace {
            let _ = write!(body, "\n\nTraceback:\n{}", trace.trim_end());
        }

        Message::new(format!("❌ {} - Error!", session.name), body)
    }
}
