//! Metrics registry capability and its Prometheus adapter
//!
//! The instrumentation never talks to Prometheus types for registration
//! directly; it goes through [`MetricsRegistry`], which looks up or creates
//! metrics by their fully-qualified name. Lookup-or-create makes repeated
//! registration of the same name a no-op that hands back the existing metric.

use crate::metrics::timer::Timer;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Histogram, HistogramOpts, IntGauge, Opts, Registry};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Value source for a gauge that is read on demand at collection time
pub type GaugeFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Buckets for request-duration timers, in seconds
pub const TIMER_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Buckets for concurrency-level samples
pub const CONCURRENCY_BUCKETS: &[f64] = &[
    1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0, 512.0, 1024.0,
];

/// Lookup-or-create access to counters, histograms, timers and gauges
///
/// Implementations must be safe to share across threads. Each method is
/// idempotent per name: the first call creates and registers the metric,
/// later calls return the same metric. Asking for an existing name as a
/// different kind of metric is an error.
pub trait MetricsRegistry: Send + Sync {
    /// Up/down counter
    fn counter(&self, name: &str, help: &str) -> Result<IntGauge, prometheus::Error>;

    /// Histogram of arbitrary samples
    fn histogram(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<Histogram, prometheus::Error>;

    /// Duration timer
    fn timer(&self, name: &str, help: &str) -> Result<Timer, prometheus::Error>;

    /// Gauge whose value is computed by `read` each time it is collected
    ///
    /// Registering a name twice keeps the first value source.
    fn gauge(&self, name: &str, help: &str, read: GaugeFn) -> Result<(), prometheus::Error>;
}

#[derive(Clone)]
enum Registered {
    Counter(IntGauge),
    Histogram(Histogram),
    Timer(Timer),
    Gauge,
}

impl Registered {
    fn kind(&self) -> &'static str {
        match self {
            Registered::Counter(_) => "counter",
            Registered::Histogram(_) => "histogram",
            Registered::Timer(_) => "timer",
            Registered::Gauge => "gauge",
        }
    }
}

/// [`MetricsRegistry`] backed by a `prometheus::Registry`
pub struct PrometheusRegistry {
    registry: Registry,
    metrics: Mutex<HashMap<String, Registered>>,
}

impl PrometheusRegistry {
    /// Create an adapter over a fresh Prometheus registry
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Create an adapter over an existing Prometheus registry
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            metrics: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying Prometheus registry, for collaborators that gather it
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of distinct metric names registered through this adapter
    pub fn len(&self) -> usize {
        self.known().len()
    }

    /// Whether nothing has been registered yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names registered so far
    ///
    /// The map is only written after a metric registered successfully, so it
    /// stays accurate even if a panic poisoned the lock.
    fn known(&self) -> MutexGuard<'_, HashMap<String, Registered>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `name`, or build, register and remember a new metric
    fn get_or_register<T>(
        &self,
        name: &str,
        build: impl FnOnce() -> Result<(Registered, Box<dyn Collector>), prometheus::Error>,
        extract: impl Fn(&Registered) -> Option<T>,
    ) -> Result<T, prometheus::Error> {
        let mut metrics = self.known();

        if let Some(existing) = metrics.get(name) {
            return extract(existing).ok_or_else(|| {
                prometheus::Error::Msg(format!(
                    "metric '{}' is already registered as a {}",
                    name,
                    existing.kind()
                ))
            });
        }

        let (registered, collector) = build()?;
        self.registry.register(collector)?;

        tracing::debug!(
            metric = %name,
            kind = registered.kind(),
            "Registered metric"
        );

        let value = extract(&registered).ok_or_else(|| {
            prometheus::Error::Msg(format!("metric '{}' registered with wrong kind", name))
        })?;
        metrics.insert(name.to_string(), registered);
        Ok(value)
    }
}

impl Default for PrometheusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry for PrometheusRegistry {
    fn counter(&self, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
        self.get_or_register(
            name,
            || {
                let counter = IntGauge::with_opts(Opts::new(name, help))?;
                Ok((
                    Registered::Counter(counter.clone()),
                    Box::new(counter) as Box<dyn Collector>,
                ))
            },
            |registered| match registered {
                Registered::Counter(counter) => Some(counter.clone()),
                _ => None,
            },
        )
    }

    fn histogram(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<Histogram, prometheus::Error> {
        self.get_or_register(
            name,
            || {
                let histogram = Histogram::with_opts(
                    HistogramOpts::new(name, help).buckets(buckets.to_vec()),
                )?;
                Ok((
                    Registered::Histogram(histogram.clone()),
                    Box::new(histogram) as Box<dyn Collector>,
                ))
            },
            |registered| match registered {
                Registered::Histogram(histogram) => Some(histogram.clone()),
                _ => None,
            },
        )
    }

    fn timer(&self, name: &str, help: &str) -> Result<Timer, prometheus::Error> {
        self.get_or_register(
            name,
            || {
                let histogram = Histogram::with_opts(
                    HistogramOpts::new(name, help).buckets(TIMER_BUCKETS.to_vec()),
                )?;
                let timer = Timer::new(name, histogram.clone());
                Ok((
                    Registered::Timer(timer),
                    Box::new(histogram) as Box<dyn Collector>,
                ))
            },
            |registered| match registered {
                Registered::Timer(timer) => Some(timer.clone()),
                _ => None,
            },
        )
    }

    fn gauge(&self, name: &str, help: &str, read: GaugeFn) -> Result<(), prometheus::Error> {
        self.get_or_register(
            name,
            || {
                let collector = FnGauge::new(name, help, read)?;
                Ok((Registered::Gauge, Box::new(collector) as Box<dyn Collector>))
            },
            |registered| match registered {
                Registered::Gauge => Some(()),
                _ => None,
            },
        )
    }
}

/// Gauge collector that refreshes its value from a closure on every collect
struct FnGauge {
    gauge: Gauge,
    read: GaugeFn,
}

impl FnGauge {
    fn new(name: &str, help: &str, read: GaugeFn) -> Result<Self, prometheus::Error> {
        Ok(Self {
            gauge: Gauge::with_opts(Opts::new(name, help))?,
            read,
        })
    }
}

impl Collector for FnGauge {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.set((self.read)());
        self.gauge.collect()
    }
}
