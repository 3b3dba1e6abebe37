//! Tower middleware for request metrics and server spans

pub mod request_metrics;
pub mod tracing_span;

pub use request_metrics::{RequestMetricsLayer, RequestMetricsService};
pub use tracing_span::{TracingLayer, TracingService};
