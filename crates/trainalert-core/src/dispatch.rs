//! Fan-out of one message to every configured channel
//!
//! Every channel is attempted concurrently and independently: a failure or
//! timeout on one never prevents delivery on the others, and no error crosses
//! this boundary. There is no retry inside a dispatch.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::channels::{Channel, DeliveryError, DeliveryResult};
use crate::config::ChannelsConfig;
use crate::error::Result;
use crate::models::Message;

/// Per-channel outcome of one dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    /// Result keyed by channel name; only enabled channels appear
    pub results: BTreeMap<&'static str, DeliveryResult>,

    /// When the dispatch started
    pub dispatched_at: DateTime<Utc>,
}

impl DispatchReport {
    /// Whether every attempted channel succeeded
    pub fn all_ok(&self) -> bool {
        self.results.values().all(DeliveryResult::is_ok)
    }

    /// Result for one channel
    pub fn get(&self, channel: &str) -> Option<&DeliveryResult> {
        self.results.get(channel)
    }

    /// Channels that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &DeliveryError)> {
        self.results.iter().filter_map(|(name, result)| match result {
            DeliveryResult::Failed(e) => Some((*name, e)),
            DeliveryResult::Ok => None,
        })
    }
}

/// Delivers composed messages to the enabled channel set
#[derive(Debug)]
pub struct ChannelDispatcher {
    channels: Vec<Channel>,
    timeout: Duration,
}

impl ChannelDispatcher {
    /// Create a dispatcher over already configured channels
    pub fn new(channels: Vec<Channel>, timeout: Duration) -> Self {
        Self { channels, timeout }
    }

    /// Build the enabled channel set from credentials
    pub fn from_config(config: &ChannelsConfig, timeout: Duration) -> Result<Self> {
        Ok(Self::new(Channel::from_config(config, timeout)?, timeout))
    }

    /// Names of the enabled channels
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(Channel::name).collect()
    }

    /// Whether no channel is enabled
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Per-channel timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deliver `message` to every enabled channel and wait for all attempts
    pub async fn dispatch(&self, message: &Message) -> DispatchReport {
        let dispatched_at = Utc::now();
        debug!(
            subject = %message.subject,
            channels = self.channels.len(),
            "Dispatching notification"
        );

        let attempts = self.channels.iter().map(|channel| async move {
            let result = match tokio::time::timeout(self.timeout, channel.deliver(message)).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout(self.timeout)),
            };

            if let Err(e) = &result {
                warn!(channel = channel.name(), error = %e, "Notification delivery failed");
            }

            (channel.name(), DeliveryResult::from(result))
        });

        DispatchReport {
            results: join_all(attempts).await.into_iter().collect(),
            dispatched_at,
        }
    }
}
