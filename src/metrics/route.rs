//! Route identifiers and the per-route timer bucket
//!
//! Every registered route gets its own `<route>-requests` timer plus a
//! `<route>-percentage` gauge expressing its request rate as a fraction of
//! the total. Requests whose route is unknown land in the reserved `Other`
//! bucket, which always exists.

use crate::error::{AppError, AppResult};
use crate::metrics::registry::MetricsRegistry;
use crate::metrics::timer::Timer;
use axum::extract::MatchedPath;
use axum::http::Request;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Raw name of the fallback timer
pub const OTHER_REQUESTS: &str = "other-requests";

/// Raw name of the fallback ratio gauge
pub const OTHER_PERCENTAGE: &str = "other-percentage";

/// Metric bucket a request is accounted to
///
/// `Total` and `Other` are reserved and never collide with a named route:
/// registration rejects names that would map onto their metrics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteId {
    /// Every request, regardless of route
    Total,
    /// Requests whose route was not registered
    Other,
    /// A registered logical route
    Named(String),
}

impl RouteId {
    /// Label used in reports
    pub fn as_str(&self) -> &str {
        match self {
            RouteId::Total => "total",
            RouteId::Other => "other",
            RouteId::Named(name) => name,
        }
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RouteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Explicit route identifier attached to a request
///
/// Takes precedence over axum's `MatchedPath`. Useful when the service is
/// not mounted behind an axum `Router`, or when several paths should share
/// one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTag(pub String);

impl RouteTag {
    pub fn new(route: impl Into<String>) -> Self {
        Self(route.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Route identifier attached to a request by the upstream route matcher
pub fn route_of<B>(request: &Request<B>) -> Option<&str> {
    let extensions = request.extensions();
    extensions
        .get::<RouteTag>()
        .map(RouteTag::as_str)
        .or_else(|| extensions.get::<MatchedPath>().map(MatchedPath::as_str))
}

/// Maps raw metric names to names qualified by a host namespace
///
/// `web-01` + `/nodes-requests` becomes `web_01_nodes_requests`: the result
/// only contains characters Prometheus accepts in metric names.
#[derive(Debug, Clone)]
pub struct MetricNamer {
    namespace: String,
}

impl MetricNamer {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully-qualified metric name for `raw`
    pub fn qualify(&self, raw: &str) -> String {
        let joined = format!("{}_{}", self.namespace, raw);
        let mut name = String::with_capacity(joined.len());
        for c in joined.chars() {
            let c = if c.is_ascii_alphanumeric() { c } else { '_' };
            if c == '_' && name.ends_with('_') {
                continue;
            }
            name.push(c);
        }
        name.truncate(name.trim_end_matches('_').len());
        name
    }
}

/// Route to timer mapping, fixed in shape after startup
///
/// Holds exactly one timer per distinct registered route plus the fallback
/// timer for `Other`. `Total` is tracked outside the bucket.
#[derive(Debug, Clone)]
pub struct TimerBucket {
    other: Timer,
    routes: HashMap<String, Timer>,
}

impl TimerBucket {
    /// Timer for `route`, falling back to the `Other` timer
    pub fn resolve(&self, route: Option<&str>) -> &Timer {
        route
            .and_then(|name| self.routes.get(name))
            .unwrap_or(&self.other)
    }

    /// Timer registered for exactly this route id
    pub fn get(&self, route: &RouteId) -> Option<&Timer> {
        match route {
            RouteId::Total => None,
            RouteId::Other => Some(&self.other),
            RouteId::Named(name) => self.routes.get(name),
        }
    }

    /// The fallback timer
    pub fn other(&self) -> &Timer {
        &self.other
    }

    /// All entries, `Other` included
    pub fn iter(&self) -> impl Iterator<Item = (RouteId, &Timer)> {
        std::iter::once((RouteId::Other, &self.other)).chain(
            self.routes
                .iter()
                .map(|(name, timer)| (RouteId::Named(name.clone()), timer)),
        )
    }

    /// Number of timers, `Other` included
    pub fn len(&self) -> usize {
        self.routes.len() + 1
    }

    /// Always false: the fallback timer is always present
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Checked metric names for a set of routes
///
/// Every route's timer and gauge names are compared against the fallback
/// bucket, the reserved names and each other before anything is registered,
/// so a rejected route leaves the registry untouched.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    other_timer: String,
    other_gauge: String,
    routes: Vec<PlannedRoute>,
}

#[derive(Debug, Clone)]
struct PlannedRoute {
    route: String,
    timer: String,
    gauge: String,
}

impl RoutePlan {
    /// Plan metric names for `routes`
    ///
    /// `reserved` pairs the qualified names of metrics registered outside
    /// the bucket with the label reported when a route collides with them.
    /// Repeated route names are skipped; the first occurrence wins.
    ///
    /// # Errors
    ///
    /// Fails when a route name is empty, or when one of its qualified metric
    /// names is reserved, belongs to the fallback bucket or to another route.
    pub fn new<I, R>(
        qualify: impl Fn(&str) -> String,
        reserved: impl IntoIterator<Item = (String, String)>,
        routes: I,
    ) -> AppResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let other_timer = qualify(OTHER_REQUESTS);
        let other_gauge = qualify(OTHER_PERCENTAGE);

        // qualified metric name -> label of its owner
        let mut owners: HashMap<String, String> = reserved.into_iter().collect();
        let other = RouteId::Other.to_string();
        owners.insert(other_timer.clone(), other.clone());
        owners.insert(other_gauge.clone(), other);

        let mut planned: Vec<PlannedRoute> = Vec::new();
        for route in routes {
            let route = route.as_ref();
            if route.is_empty() {
                return Err(AppError::RouteRegistration {
                    route: route.to_string(),
                    reason: "route names must not be empty".to_string(),
                });
            }
            if planned.iter().any(|p| p.route == route) {
                tracing::debug!(route = %route, "Route already registered, skipping");
                continue;
            }

            let timer = qualify(&format!("{}-requests", route));
            let gauge = qualify(&format!("{}-percentage", route));
            for name in [&timer, &gauge] {
                if let Some(owner) = owners.get(name) {
                    return Err(AppError::RouteRegistration {
                        route: route.to_string(),
                        reason: format!("metric name '{}' is already used by '{}'", name, owner),
                    });
                }
            }

            owners.insert(timer.clone(), route.to_string());
            owners.insert(gauge.clone(), route.to_string());
            planned.push(PlannedRoute {
                route: route.to_string(),
                timer,
                gauge,
            });
        }

        Ok(Self {
            other_timer,
            other_gauge,
            routes: planned,
        })
    }

    /// Number of distinct named routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register the planned timers and ratio gauges
    ///
    /// Creates (or fetches, on repeat calls against the same registry) the
    /// fallback timer and one timer per route, each with a ratio gauge read
    /// against `total`.
    pub fn register(
        &self,
        registry: &dyn MetricsRegistry,
        total: &Timer,
    ) -> Result<TimerBucket, prometheus::Error> {
        let other = registry.timer(
            &self.other_timer,
            "Duration of requests that matched no registered route",
        )?;
        register_ratio(
            registry,
            &self.other_gauge,
            "Share of request rate served by unregistered routes",
            &other,
            total,
        )?;

        let mut timers: HashMap<String, Timer> = HashMap::with_capacity(self.routes.len());
        for planned in &self.routes {
            let timer = registry.timer(
                &planned.timer,
                &format!("Duration of {} requests", planned.route),
            )?;
            register_ratio(
                registry,
                &planned.gauge,
                &format!("Share of request rate served by {}", planned.route),
                &timer,
                total,
            )?;
            timers.insert(planned.route.clone(), timer);
        }

        tracing::info!(
            routes = timers.len(),
            fallback = %other.name(),
            "Route timers registered"
        );

        Ok(TimerBucket {
            other,
            routes: timers,
        })
    }
}

/// Build the route timer bucket
///
/// Plans the route metric names (see [`RoutePlan::new`]) with the total
/// timer's name reserved, then registers them.
///
/// # Errors
///
/// Fails when a route is rejected by the plan or the registry rejects a
/// metric.
pub fn build_route_timers<I, R>(
    registry: &dyn MetricsRegistry,
    total: &Timer,
    qualify: impl Fn(&str) -> String,
    routes: I,
) -> AppResult<TimerBucket>
where
    I: IntoIterator<Item = R>,
    R: AsRef<str>,
{
    let reserved = [(total.name().to_string(), RouteId::Total.to_string())];
    let plan = RoutePlan::new(qualify, reserved, routes)?;
    Ok(plan.register(registry, total)?)
}

fn register_ratio(
    registry: &dyn MetricsRegistry,
    name: &str,
    help: &str,
    numerator: &Timer,
    denominator: &Timer,
) -> Result<(), prometheus::Error> {
    let numerator = numerator.clone();
    let denominator = denominator.clone();
    registry.gauge(
        name,
        help,
        Box::new(move || numerator.rate_ratio(&denominator)),
    )
}
