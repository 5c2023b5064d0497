//! Error types for TrainAlert

use thiserror::Error;

use crate::models::{Direction, SessionStatus};

/// Result type alias using TrainAlert's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for TrainAlert operations
///
/// Channel delivery failures are not part of this enum: they are captured per
/// channel in [`crate::channels::DeliveryResult`] and never reach the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Metric value is NaN or infinite
    #[error("Invalid metric '{name}': value {value} is not finite")]
    InvalidMetric { name: String, value: f64 },

    /// Metric direction was already fixed to something else
    #[error("Metric '{name}' is already tracked as {existing}, cannot switch to {requested}")]
    DirectionConflict {
        name: String,
        existing: Direction,
        requested: Direction,
    },

    /// Session state does not allow the operation
    #[error("Cannot {operation} while training is {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid metric error
    pub fn invalid_metric(name: impl Into<String>, value: f64) -> Self {
        Self::InvalidMetric {
            name: name.into(),
            value,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, status: SessionStatus) -> Self {
        Self::InvalidState { operation, status }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from input or state validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMetric { .. } | Self::DirectionConflict { .. } | Self::InvalidState { .. }
        )
    }
}
