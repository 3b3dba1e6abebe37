//! Routestat - per-route request metrics and server spans for HTTP services
//!
//! This library instruments tower/axum services with:
//! - per-route request timers, an in-flight counter and concurrency samples
//!   ([`metrics`], [`middleware::RequestMetricsLayer`])
//! - a summary of where request time goes ([`metrics::summary`])
//! - W3C trace-context aware server spans ([`trace`], [`middleware::TracingLayer`])

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod telemetry;
pub mod trace;
