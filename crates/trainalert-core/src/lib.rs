//! # TrainAlert
//!
//! Notifications for long-running training jobs.
//!
//! TrainAlert watches the metrics a training loop reports, decides when
//! something is worth telling a human (start, periodic checkpoint, new best
//! value, completion, failure) and fans one composed message out to e-mail,
//! Slack and Discord. A channel outage never interrupts training.
//!
//! ## Architecture
//!
//! - **Metrics**: per-metric history with best-value tracking
//! - **Trigger**: pure policy turning observations into events
//! - **Dispatch**: concurrent, failure-isolated delivery to every channel
//! - **Notifier**: the facade tying them together
//!
//! ## Quick Start
//!
//! ```bash
//! # Pipe JSON-line reports from any training process
//! python train.py | trainalert watch
//!
//! # Check channel credentials
//! trainalert test
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notifier;
pub mod render;
pub mod system;
pub mod trigger;

pub use config::Config;
pub use error::{Error, Result};
pub use notifier::{NotificationOutcome, TrainingNotifier};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dispatch::{ChannelDispatcher, DispatchReport};
    pub use crate::error::{Error, Result};
    pub use crate::metrics::MetricStore;
    pub use crate::models::*;
    pub use crate::notifier::{NotificationOutcome, TrainingNotifier};
}
