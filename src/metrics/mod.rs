//! Per-route request metrics
//!
//! This module provides the instrumentation state shared by the request
//! metrics middleware and the summary report:
//! - In-flight request count and a histogram of concurrency samples
//! - A total timer spanning every request
//! - One timer per registered route plus a fallback `Other` timer
//! - Ratio gauges giving each route's share of the total request rate
//!
//! Metric names are qualified with a host namespace, e.g. with namespace
//! `web-01` the `/nodes` route timer is registered as `web_01_nodes_requests`.
//!
//! Instrumentation is optional. Without a registry the state is
//! [`HttpMetrics::Disabled`] and wrapping a router is a no-op.

pub mod registry;
pub mod route;
pub mod summary;
pub mod timer;

use crate::error::AppResult;
use crate::middleware::request_metrics::RequestMetricsLayer;
use axum::Router;
use prometheus::{Histogram, IntGauge};
use registry::{CONCURRENCY_BUCKETS, MetricsRegistry};
use route::{MetricNamer, RoutePlan, TimerBucket};
use std::sync::Arc;
use summary::RequestSummary;
use timer::Timer;

/// Raw name of the available-CPU gauge
pub const NUM_CPUS: &str = "num-cpus";

/// Raw name of the in-flight request counter
pub const ACTIVE_REQUESTS: &str = "active-requests";

/// Raw name of the concurrency sample histogram
pub const ACTIVE_HISTO: &str = "active-histo";

/// Raw name of the timer spanning every request
pub const TOTAL_REQUESTS: &str = "total-requests";

/// Metrics registered next to the route bucket; route names may not map onto them
pub const FIXED_METRICS: &[&str] = &[NUM_CPUS, ACTIVE_REQUESTS, ACTIVE_HISTO, TOTAL_REQUESTS];

/// Instrumentation handle shared by the middleware and the summary builder
pub struct HttpMetricsState {
    active_requests: IntGauge,
    active_histogram: Histogram,
    total_timer: Timer,
    route_timers: TimerBucket,
}

impl HttpMetricsState {
    /// Register all request metrics for `routes`
    ///
    /// Registers `num-cpus`, `active-requests`, `active-histo`,
    /// `total-requests` and the route timers, each qualified by `namer`.
    /// Calling this again against the same registry reuses the metrics that
    /// already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a route name is rejected (see [`RoutePlan::new`]),
    /// in which case nothing is registered, or if a metric cannot be
    /// registered.
    pub fn register<I, R>(
        registry: &dyn MetricsRegistry,
        namer: &MetricNamer,
        routes: I,
    ) -> AppResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let reserved = FIXED_METRICS
            .iter()
            .map(|raw| (namer.qualify(raw), raw.to_string()));
        let plan = RoutePlan::new(|raw| namer.qualify(raw), reserved, routes)?;

        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as f64;
        registry.gauge(
            &namer.qualify(NUM_CPUS),
            "Number of CPUs available to the process",
            Box::new(move || cpus),
        )?;

        let active_requests = registry.counter(
            &namer.qualify(ACTIVE_REQUESTS),
            "Requests currently being handled",
        )?;
        let active_histogram = registry.histogram(
            &namer.qualify(ACTIVE_HISTO),
            "In-flight request count sampled on request entry and exit",
            CONCURRENCY_BUCKETS,
        )?;
        let total_timer = registry.timer(
            &namer.qualify(TOTAL_REQUESTS),
            "Duration of every request regardless of route",
        )?;
        let route_timers = plan.register(registry, &total_timer)?;

        tracing::info!(
            namespace = %namer.namespace(),
            route_buckets = route_timers.len(),
            "Request metrics registered"
        );

        Ok(Self {
            active_requests,
            active_histogram,
            total_timer,
            route_timers,
        })
    }

    /// Requests currently in flight
    pub fn active_requests(&self) -> i64 {
        self.active_requests.get()
    }

    /// Number of concurrency samples taken
    pub fn active_samples(&self) -> u64 {
        self.active_histogram.get_sample_count()
    }

    pub fn total_timer(&self) -> &Timer {
        &self.total_timer
    }

    pub fn route_timers(&self) -> &TimerBucket {
        &self.route_timers
    }

    /// Count a request as in flight until the returned guard is dropped
    pub(crate) fn enter(&self) -> ActiveRequest<'_> {
        self.active_requests.inc();
        self.sample_active();
        ActiveRequest { state: self }
    }

    fn sample_active(&self) {
        self.active_histogram.observe(self.active_requests.get() as f64);
    }
}

/// In-flight marker; decrements and samples the counter when dropped
pub(crate) struct ActiveRequest<'a> {
    state: &'a HttpMetricsState,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.state.active_requests.dec();
        self.state.sample_active();
    }
}

/// Request instrumentation, selected once at construction
#[derive(Clone, Default)]
pub enum HttpMetrics {
    /// No registry was supplied; nothing is measured
    #[default]
    Disabled,
    /// Metrics are registered and recorded
    Enabled(Arc<HttpMetricsState>),
}

impl HttpMetrics {
    /// Build instrumentation for `routes`
    ///
    /// `None` for the registry selects [`HttpMetrics::Disabled`] without
    /// touching any metric.
    pub fn new<I, R>(
        registry: Option<&dyn MetricsRegistry>,
        namer: &MetricNamer,
        routes: I,
    ) -> AppResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        match registry {
            Some(registry) => Ok(Self::Enabled(Arc::new(HttpMetricsState::register(
                registry, namer, routes,
            )?))),
            None => {
                tracing::info!("No metrics registry configured, request metrics disabled");
                Ok(Self::Disabled)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// Shared state, if enabled
    pub fn state(&self) -> Option<&Arc<HttpMetricsState>> {
        match self {
            Self::Enabled(state) => Some(state),
            Self::Disabled => None,
        }
    }

    /// Middleware layer, if enabled
    ///
    /// For composing with `tower::ServiceBuilder::option_layer`.
    pub fn layer(&self) -> Option<RequestMetricsLayer> {
        self.state().map(|state| RequestMetricsLayer::new(Arc::clone(state)))
    }

    /// Wrap every route of `router` with the request metrics middleware
    ///
    /// Returns the router unchanged when disabled.
    pub fn instrument<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self.layer() {
            Some(layer) => router.layer(layer),
            None => router,
        }
    }

    /// Current summary report, if enabled
    pub fn summary(&self) -> Option<RequestSummary> {
        self.state().map(|state| RequestSummary::build(state))
    }
}
