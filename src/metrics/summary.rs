//! Request summary report
//!
//! Turns live timer state into a per-route view of where request time goes.
//! Each timer is read independently, so a summary taken while requests are
//! in flight may show slight skew between routes and the total.

use crate::metrics::HttpMetricsState;
use crate::metrics::route::RouteId;
use crate::metrics::timer::Timer;
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot of one route's timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub route: RouteId,
    /// Number of recorded requests
    pub count: u64,
    /// Mean latency in whole milliseconds, truncated
    pub mean_ms: u64,
    /// `mean_ms * count`, approximate time spent serving the route
    pub aggregate_ms: u64,
}

impl RouteSummary {
    /// Summarize a timer
    ///
    /// Samples are nanosecond-resolution `Duration`s; the mean is truncated
    /// to whole milliseconds before the aggregate is computed. A timer with
    /// no samples yields all zeros.
    pub fn from_timer(route: RouteId, timer: &Timer) -> Self {
        let count = timer.count();
        let mean_ms = u64::try_from(timer.mean().as_millis()).unwrap_or(u64::MAX);
        Self {
            route,
            count,
            mean_ms,
            aggregate_ms: mean_ms.saturating_mul(count),
        }
    }
}

/// Summary of every route, `Other` and `Total`
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    /// Summaries keyed by route id
    pub routes: BTreeMap<RouteId, RouteSummary>,
    /// The same summaries ordered by `aggregate_ms`, largest first
    ///
    /// Ties keep route id order: `total`, `other`, then named routes
    /// alphabetically.
    pub ranked: Vec<RouteSummary>,
}

impl RequestSummary {
    /// Read the current state of all timers
    pub fn build(state: &HttpMetricsState) -> Self {
        let mut routes: BTreeMap<RouteId, RouteSummary> = state
            .route_timers()
            .iter()
            .map(|(route, timer)| (route.clone(), RouteSummary::from_timer(route, timer)))
            .collect();
        routes.insert(
            RouteId::Total,
            RouteSummary::from_timer(RouteId::Total, state.total_timer()),
        );

        Self::from_routes(routes)
    }

    /// Rank an already-computed set of route summaries
    pub fn from_routes(routes: BTreeMap<RouteId, RouteSummary>) -> Self {
        let mut ranked: Vec<RouteSummary> = routes.values().cloned().collect();
        // stable sort: ties stay in BTreeMap (route id) order
        ranked.sort_by(|a, b| b.aggregate_ms.cmp(&a.aggregate_ms));
        Self { routes, ranked }
    }

    /// Summary for one route
    pub fn get(&self, route: &RouteId) -> Option<&RouteSummary> {
        self.routes.get(route)
    }
}
