//! Trigger policy
//!
//! Decides, from the session state and the observations of one call, which
//! notification events fire.

mod policy;

pub use policy::{Operation, Transition, TriggerPolicy};
