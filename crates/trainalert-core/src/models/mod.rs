//! Data models for TrainAlert

mod event;
mod message;
mod metrics;
mod session;

pub use event::*;
pub use message::*;
pub use metrics::*;
pub use session::*;
