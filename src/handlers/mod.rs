//! HTTP request handlers for the Routestat API

use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::HttpMetrics;
use crate::metrics::registry::{MetricsRegistry, PrometheusRegistry};
use crate::middleware::TracingLayer;
use crate::trace;
use axum::{Router, routing::get};
use opentelemetry_sdk::trace::SdkTracer;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

pub mod health;
pub mod status;
pub mod summary;

/// Routes registered as metric routes at startup
pub const ROUTES: &[&str] = &["/status", "/nodes", "/health", "/metrics/summary"];

/// Application state shared across all handlers
///
/// All fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    metrics: HttpMetrics,
    registry: Option<Arc<PrometheusRegistry>>,
    tracer: Option<SdkTracer>,
}

impl AppState {
    /// Create state from configuration
    ///
    /// A fresh Prometheus registry is created when metrics are enabled.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let registry = config
            .metrics
            .enabled
            .then(|| Arc::new(PrometheusRegistry::new()));
        Self::with_registry(config, registry)
    }

    /// Create state registering metrics into `registry`
    ///
    /// `None` disables request metrics regardless of configuration.
    pub fn with_registry(
        config: Arc<Config>,
        registry: Option<Arc<PrometheusRegistry>>,
    ) -> AppResult<Self> {
        let metrics = HttpMetrics::new(
            registry.as_deref().map(|r| r as &dyn MetricsRegistry),
            &config.metrics.namer(),
            ROUTES,
        )?;

        let tracer = config.tracing.enabled.then(|| {
            trace::tracer(&trace::provider(config.tracing.service_name.as_str()))
        });

        Ok(Self {
            config,
            metrics,
            registry,
            tracer,
        })
    }

    /// Replace the server span tracer
    pub fn with_tracer(mut self, tracer: Option<SdkTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &HttpMetrics {
        &self.metrics
    }

    /// Registry the request metrics were registered into, if enabled
    pub fn registry(&self) -> Option<&PrometheusRegistry> {
        self.registry.as_deref()
    }

    pub fn tracer(&self) -> Option<&SdkTracer> {
        self.tracer.as_ref()
    }
}

/// Build the application router
///
/// Layers, innermost first: request metrics, server spans, panic recovery.
/// Panics become `500` responses after the inner layers have cleaned up.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/status", get(status::status))
        .route("/nodes", get(status::nodes))
        .route("/health", get(health::handler))
        .route("/metrics/summary", get(summary::handler));

    let routes = state.metrics().instrument(routes);
    let routes = match state.tracer() {
        Some(tracer) => routes.layer(TracingLayer::new(tracer.clone())),
        None => routes,
    };

    routes.layer(CatchPanicLayer::new()).with_state(state)
}
