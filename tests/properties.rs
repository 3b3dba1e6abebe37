//! Property tests for route registration and summary ranking

use proptest::prelude::*;
use routestat::error::AppError;
use routestat::metrics::HttpMetricsState;
use routestat::metrics::registry::PrometheusRegistry;
use routestat::metrics::route::{MetricNamer, RouteId};
use routestat::metrics::summary::{RequestSummary, RouteSummary};
use std::collections::{BTreeMap, HashSet};

/// Metrics registered besides the route bucket: cpus, active, histogram, total
const FIXED_METRICS: usize = 4;

/// Routes whose metric names map onto the fixed metrics or the fallback bucket
const SHADOWING: &[&str] = &["/total", "/other", "/active"];

fn route_names() -> impl Strategy<Value = HashSet<String>> {
    (
        prop::collection::hash_set("/[a-z]{1,8}", 0..12),
        prop::option::weighted(0.25, prop::sample::select(SHADOWING)),
    )
        .prop_map(|(mut names, shadowing)| {
            names.extend(shadowing.map(str::to_string));
            names
        })
}

fn shadows_a_fixed_metric(routes: &HashSet<String>) -> bool {
    routes.iter().any(|r| SHADOWING.contains(&r.as_str()))
}

proptest! {
    #[test]
    fn registering_twice_yields_one_timer_per_route(routes in route_names()) {
        let registry = PrometheusRegistry::new();
        let namer = MetricNamer::new("prop");

        let first = match HttpMetricsState::register(&registry, &namer, routes.iter()) {
            Ok(state) => state,
            Err(AppError::RouteRegistration { route, .. }) => {
                prop_assert!(SHADOWING.contains(&route.as_str()));
                prop_assert!(registry.is_empty(), "rejected routes register nothing");
                return Ok(());
            }
            Err(other) => return Err(TestCaseError::fail(other.to_string())),
        };
        prop_assert!(!shadows_a_fixed_metric(&routes));
        let second = HttpMetricsState::register(&registry, &namer, routes.iter()).unwrap();

        prop_assert_eq!(first.route_timers().len(), routes.len() + 1);
        prop_assert_eq!(second.route_timers().len(), routes.len() + 1);
        // timer + percentage gauge per route and for the fallback
        prop_assert_eq!(registry.len(), FIXED_METRICS + 2 * (routes.len() + 1));
    }

    #[test]
    fn duplicate_route_names_collapse(routes in route_names(), repeats in 2usize..4) {
        prop_assume!(!shadows_a_fixed_metric(&routes));
        let registry = PrometheusRegistry::new();
        let repeated: Vec<&String> = (0..repeats).flat_map(|_| routes.iter()).collect();

        let state =
            HttpMetricsState::register(&registry, &MetricNamer::new("prop"), repeated).unwrap();

        prop_assert_eq!(state.route_timers().len(), routes.len() + 1);
    }

    #[test]
    fn ranked_is_a_stable_descending_permutation(
        entries in prop::collection::btree_map("/[a-z]{1,6}", (0u64..50, 0u64..20), 0..16)
    ) {
        let routes: BTreeMap<RouteId, RouteSummary> = entries
            .into_iter()
            .map(|(name, (count, mean_ms))| {
                let route = RouteId::Named(name);
                let summary = RouteSummary {
                    route: route.clone(),
                    count,
                    mean_ms,
                    aggregate_ms: count * mean_ms,
                };
                (route, summary)
            })
            .collect();

        let report = RequestSummary::from_routes(routes.clone());

        prop_assert_eq!(report.ranked.len(), routes.len());
        for pair in report.ranked.windows(2) {
            prop_assert!(pair[0].aggregate_ms >= pair[1].aggregate_ms);
            if pair[0].aggregate_ms == pair[1].aggregate_ms {
                prop_assert!(pair[0].route < pair[1].route, "ties keep route order");
            }
        }
        for summary in &report.ranked {
            prop_assert_eq!(routes.get(&summary.route), Some(summary));
        }
    }
}
