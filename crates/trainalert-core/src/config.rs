//! Configuration management for TrainAlert
//!
//! The library only ever consumes an explicit [`Config`] value. Reading files
//! and the environment is confined to [`Config::load`], which the CLI calls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::models::Direction;

/// Environment variable prefix for overrides, e.g. `TRAINALERT_NOTIFIER__TRAINING_NAME`
pub const ENV_PREFIX: &str = "TRAINALERT";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trigger and message options
    pub notifier: NotifierConfig,

    /// Channel credentials
    pub channels: ChannelsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from `.env`, a TOML file and `TRAINALERT_*` variables
    ///
    /// An explicit `path` must exist. Without one the per-user config file is
    /// used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env is the normal case
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = default_config_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Per-user config file location, e.g. `~/.config/trainalert/config.toml`
pub fn default_config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "", "trainalert")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Trigger and message options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Name shown in every message
    pub training_name: String,

    /// Periodic checkpoint interval in epochs; zero or negative disables it
    pub notify_every_n_epochs: i64,

    /// Notify when training starts
    pub notify_on_start: bool,

    /// Notify when a metric reaches a new best value
    pub notify_on_improvement: bool,

    /// Notify when training completes
    pub notify_on_complete: bool,

    /// Notify when training fails
    pub notify_on_error: bool,

    /// Attach metric history to checkpoint and completion messages
    pub include_plots: bool,

    /// Include host information in start and completion messages
    pub include_system_info: bool,

    /// Upper bound for a single channel delivery
    #[serde(with = "humantime_serde")]
    pub delivery_timeout: Duration,

    /// Explicit comparison directions by metric name
    pub metric_directions: HashMap<String, Direction>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            training_name: "ML Training".to_string(),
            notify_every_n_epochs: 10,
            notify_on_start: true,
            notify_on_improvement: true,
            notify_on_complete: true,
            notify_on_error: true,
            include_plots: true,
            include_system_info: true,
            delivery_timeout: Duration::from_secs(30),
            metric_directions: HashMap::new(),
        }
    }
}

/// Channel credentials; a channel without credentials stays disabled
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// SMTP e-mail
    pub email: Option<EmailConfig>,

    /// Slack incoming webhook
    pub slack: Option<SlackConfig>,

    /// Discord webhook
    pub discord: Option<DiscordConfig>,
}

/// Well-known SMTP providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpProvider {
    /// smtp.gmail.com
    #[default]
    Gmail,
    /// smtp-mail.outlook.com
    Outlook,
    /// smtp.mail.yahoo.com
    Yahoo,
    /// Server and port given explicitly
    Custom,
}

impl SmtpProvider {
    /// Default server and port for the provider
    pub fn endpoint(self) -> Option<(&'static str, u16)> {
        match self {
            SmtpProvider::Gmail => Some(("smtp.gmail.com", 587)),
            SmtpProvider::Outlook => Some(("smtp-mail.outlook.com", 587)),
            SmtpProvider::Yahoo => Some(("smtp.mail.yahoo.com", 587)),
            SmtpProvider::Custom => None,
        }
    }
}

/// Transport security for SMTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS
    #[default]
    Starttls,
    /// Implicit TLS (usually port 465)
    Tls,
    /// No encryption; local relays and tests only
    None,
}

/// E-mail channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Sender address, also used as the SMTP login
    pub address: Option<String>,

    /// SMTP password (an app password for Gmail)
    pub password: Option<String>,

    /// Recipient; defaults to the sender
    pub recipient: Option<String>,

    /// Provider preset for server and port
    pub provider: SmtpProvider,

    /// Explicit SMTP server, overrides the provider preset
    pub smtp_server: Option<String>,

    /// Explicit SMTP port, overrides the provider preset
    pub smtp_port: Option<u16>,

    /// Transport security
    pub security: SmtpSecurity,
}

impl EmailConfig {
    /// Server and port after applying the provider preset
    pub fn endpoint(&self) -> Option<(String, u16)> {
        let preset = self.provider.endpoint();
        let server = self
            .smtp_server
            .clone()
            .or_else(|| preset.map(|(server, _)| server.to_string()))?;
        let port = self
            .smtp_port
            .or_else(|| preset.map(|(_, port)| port))
            .unwrap_or(587);
        Some((server, port))
    }
}

/// Slack channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Incoming webhook URL
    pub webhook_url: Option<String>,

    /// Channel override
    pub channel: Option<String>,

    /// Display name override
    pub username: Option<String>,
}

/// Discord channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Webhook URL
    pub webhook_url: Option<String>,

    /// Display name override
    pub username: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
