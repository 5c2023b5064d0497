//! Discord webhook channel

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::config::DiscordConfig;
use crate::models::Message;

use super::{check_response, parse_webhook_url, truncate, truncate_title, DeliveryError};

/// Room left in the 2000-character embed description for the code fence
const MAX_DESCRIPTION_CHARS: usize = 1900;

/// Embed title limit
const MAX_TITLE_CHARS: usize = 256;

/// Embed accent colour (blue)
const EMBED_COLOR: u32 = 3_447_003;

/// Posts messages, and uploads attachments, to a Discord webhook
#[derive(Debug, Clone)]
pub struct DiscordChannel {
    client: Client,
    webhook_url: url::Url,
    username: Option<String>,
}

impl DiscordChannel {
    /// Returns `None` when no valid webhook URL is configured
    pub fn configure(config: &DiscordConfig, client: Client) -> Option<Self> {
        let webhook_url = parse_webhook_url(config.webhook_url.as_deref())?;
        Some(Self {
            client,
            webhook_url,
            username: config.username.clone(),
        })
    }

    /// Send Discord notification
    pub async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        let payload = DiscordPayload {
            username: self.username.clone(),
            embeds: vec![DiscordEmbed {
                title: truncate_title(&message.subject, MAX_TITLE_CHARS),
                description: format!(
                    "```\n{}\n```",
                    truncate(&message.body, MAX_DESCRIPTION_CHARS)
                ),
                color: EMBED_COLOR,
            }],
        };

        let request = self.client.post(self.webhook_url.clone());
        let request = if message.attachments.is_empty() {
            request.json(&payload)
        } else {
            let payload_json = serde_json::to_string(&payload)
                .map_err(|e| DeliveryError::Http(e.to_string()))?;
            let mut form = Form::new().text("payload_json", payload_json);
            for (index, attachment) in message.attachments.iter().enumerate() {
                let part = Part::bytes(attachment.data.clone())
                    .file_name(attachment.filename.clone())
                    .mime_str(&attachment.content_type)
                    .map_err(|e| DeliveryError::Http(e.to_string()))?;
                form = form.part(format!("files[{index}]"), part);
            }
            request.multipart(form)
        };

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        check_response("Discord", response).await?;

        info!(subject = %message.subject, "Discord message sent");
        Ok(())
    }
}

// Discord payload types
#[derive(Debug, Serialize)]
struct DiscordPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
}
