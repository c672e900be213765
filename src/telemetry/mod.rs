//! Telemetry for monitoring executor behavior.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
