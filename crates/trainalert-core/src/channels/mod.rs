//! Notification channels
//!
//! A closed set of transports behind one `deliver` capability. Each variant is
//! configured from its credentials; a channel whose credentials are missing
//! is simply never constructed.

mod discord;
mod email;
mod slack;

pub use discord::DiscordChannel;
pub use email::EmailChannel;
pub use slack::SlackChannel;

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ChannelsConfig;
use crate::error::{Error, Result};
use crate::models::Message;

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DeliveryResult {
    /// The provider accepted the message
    Ok,
    /// The attempt failed
    Failed(DeliveryError),
}

impl DeliveryResult {
    /// Whether the delivery succeeded
    pub fn is_ok(&self) -> bool {
        matches!(self, DeliveryResult::Ok)
    }
}

impl From<std::result::Result<(), DeliveryError>> for DeliveryResult {
    fn from(result: std::result::Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => DeliveryResult::Ok,
            Err(e) => DeliveryResult::Failed(e),
        }
    }
}

/// Delivery errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{provider} returned {code}: {body}")]
    Status {
        provider: &'static str,
        code: u16,
        body: String,
    },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// A configured notification channel
#[derive(Debug)]
pub enum Channel {
    /// SMTP e-mail
    Email(EmailChannel),
    /// Slack incoming webhook
    Slack(SlackChannel),
    /// Discord webhook
    Discord(DiscordChannel),
}

impl Channel {
    /// Build every channel whose credentials are present, in a fixed order
    pub fn from_config(config: &ChannelsConfig, timeout: Duration) -> Result<Vec<Channel>> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        let mut channels = Vec::new();

        if let Some(email) = &config.email {
            match EmailChannel::configure(email, timeout) {
                Some(channel) => channels.push(Channel::Email(channel)),
                None => warn!("Email credentials not provided, email notifications disabled"),
            }
        }
        if let Some(slack) = &config.slack {
            match SlackChannel::configure(slack, client.clone()) {
                Some(channel) => channels.push(Channel::Slack(channel)),
                None => warn!("Slack webhook URL missing or invalid, Slack notifications disabled"),
            }
        }
        if let Some(discord) = &config.discord {
            match DiscordChannel::configure(discord, client) {
                Some(channel) => channels.push(Channel::Discord(channel)),
                None => warn!("Discord webhook URL missing or invalid, Discord notifications disabled"),
            }
        }

        let names: Vec<&str> = channels.iter().map(Channel::name).collect();
        info!(channels = ?names, "Notification channels configured");

        Ok(channels)
    }

    /// Channel name used as the key of dispatch reports
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Email(_) => "email",
            Channel::Slack(_) => "slack",
            Channel::Discord(_) => "discord",
        }
    }

    /// Deliver a message
    pub async fn deliver(&self, message: &Message) -> std::result::Result<(), DeliveryError> {
        match self {
            Channel::Email(channel) => channel.deliver(message).await,
            Channel::Slack(channel) => channel.deliver(message).await,
            Channel::Discord(channel) => channel.deliver(message).await,
        }
    }
}

/// Parse a webhook URL, accepting only http(s)
fn parse_webhook_url(raw: Option<&str>) -> Option<url::Url> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(url) => {
            warn!(scheme = url.scheme(), "Unsupported webhook URL scheme");
            None
        }
        Err(e) => {
            warn!(error = %e, "Invalid webhook URL");
            None
        }
    }
}

/// Cut a message body to at most `max` characters, marker included
fn truncate(text: &str, max: usize) -> String {
    cut_with_marker(text, max, "\n... (truncated)")
}

/// Cut a single-line title to at most `max` characters, marker included
fn truncate_title(text: &str, max: usize) -> String {
    cut_with_marker(text, max, "...")
}

fn cut_with_marker(text: &str, max: usize, marker: &str) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(marker.chars().count());
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(marker);
    cut
}

/// Turn a non-success HTTP response into a `DeliveryError`
async fn check_response(
    provider: &'static str,
    response: reqwest::Response,
) -> std::result::Result<(), DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::Status {
        provider,
        code: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscordConfig, EmailConfig, SlackConfig};

    #[test]
    fn test_channels_without_credentials_are_skipped() {
        let config = ChannelsConfig {
            email: Some(EmailConfig {
                address: Some("me@example.com".to_string()),
                ..Default::default()
            }),
            slack: Some(SlackConfig::default()),
            discord: Some(DiscordConfig {
                webhook_url: Some("not a url".to_string()),
                ..Default::default()
            }),
        };

        let channels = Channel::from_config(&config, Duration::from_secs(5)).unwrap();

        assert!(channels.is_empty());
    }

    #[test]
    fn test_configured_channels_in_fixed_order() {
        let config = ChannelsConfig {
            discord: Some(DiscordConfig {
                webhook_url: Some("https://discord.com/api/webhooks/1/abc".to_string()),
                ..Default::default()
            }),
            slack: Some(SlackConfig {
                webhook_url: Some("https://hooks.slack.com/services/T/B/X".to_string()),
                ..Default::default()
            }),
            email: Some(EmailConfig {
                address: Some("me@example.com".to_string()),
                password: Some("secret".to_string()),
                ..Default::default()
            }),
        };

        let channels = Channel::from_config(&config, Duration::from_secs(5)).unwrap();
        let names: Vec<&str> = channels.iter().map(Channel::name).collect();

        assert_eq!(names, vec!["email", "slack", "discord"]);
    }

    #[test]
    fn test_webhook_url_scheme() {
        assert!(parse_webhook_url(Some("https://example.com/hook")).is_some());
        assert!(parse_webhook_url(Some("ftp://example.com/hook")).is_none());
        assert!(parse_webhook_url(Some("   ")).is_none());
        assert!(parse_webhook_url(None).is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");

        let body = "x".repeat(100);
        let cut = truncate(&body, 40);
        assert_eq!(cut.chars().count(), 40);
        assert!(cut.ends_with("\n... (truncated)"));
    }

    #[test]
    fn test_truncate_title_stays_within_limit() {
        assert_eq!(truncate_title("Checkpoint", 150), "Checkpoint");

        let title = format!("📍 {} - Checkpoint", "resnet".repeat(40));
        let cut = truncate_title(&title, 150);
        assert_eq!(cut.chars().count(), 150);
        assert!(cut.ends_with("..."));
        assert!(!cut.contains('\n'));
    }
}
