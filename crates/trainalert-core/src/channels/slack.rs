//! Slack incoming-webhook channel

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SlackConfig;
use crate::models::Message;

use super::{check_response, parse_webhook_url, truncate, truncate_title, DeliveryError};

/// Section text limit imposed by Slack's block kit
const MAX_SECTION_CHARS: usize = 2900;

/// Header text limit imposed by Slack's block kit
const MAX_HEADER_CHARS: usize = 150;

/// Posts messages to a Slack incoming webhook
#[derive(Debug, Clone)]
pub struct SlackChannel {
    client: Client,
    webhook_url: url::Url,
    channel: Option<String>,
    username: Option<String>,
}

impl SlackChannel {
    /// Returns `None` when no valid webhook URL is configured
    pub fn configure(config: &SlackConfig, client: Client) -> Option<Self> {
        let webhook_url = parse_webhook_url(config.webhook_url.as_deref())?;
        Some(Self {
            client,
            webhook_url,
            channel: config.channel.clone(),
            username: config.username.clone(),
        })
    }

    /// Send Slack notification
    pub async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        if !message.attachments.is_empty() {
            // Incoming webhooks cannot upload files
            debug!(count = message.attachments.len(), "Skipping attachments for Slack");
        }

        let payload = SlackPayload {
            channel: self.channel.clone(),
            username: self.username.clone(),
            blocks: vec![
                SlackBlock::Header {
                    text: SlackText::plain(truncate_title(&message.subject, MAX_HEADER_CHARS)),
                },
                SlackBlock::Section {
                    text: SlackText::markdown(format!(
                        "```{}```",
                        truncate(&message.body, MAX_SECTION_CHARS)
                    )),
                },
            ],
        };

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        check_response("Slack", response).await?;

        info!(subject = %message.subject, "Slack notification sent");
        Ok(())
    }
}

// Slack payload types
#[derive(Debug, Serialize)]
struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    blocks: Vec<SlackBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackBlock {
    Header { text: SlackText },
    Section { text: SlackText },
}

#[derive(Debug, Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    emoji: Option<bool>,
}

impl SlackText {
    fn plain(text: String) -> Self {
        Self {
            kind: "plain_text",
            text,
            emoji: Some(true),
        }
    }

    fn markdown(text: String) -> Self {
        Self {
            kind: "mrkdwn",
            text,
            emoji: None,
        }
    }
}
