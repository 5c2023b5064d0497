//! Metric tracking
//!
//! Holds every reported observation per metric and keeps the best value under
//! each metric's comparison direction.

mod direction;
mod store;

pub use direction::infer_direction;
pub use store::{MetricSeries, MetricStore};
