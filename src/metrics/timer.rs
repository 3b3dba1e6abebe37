//! Duration timer built on a Prometheus histogram
//!
//! A `Timer` records request durations into a histogram of seconds and
//! answers the three questions the summary and ratio gauges need: how many
//! samples, their mean, and the sample rate since the timer was created.

use prometheus::Histogram;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Duration-recording timer
///
/// Cloning is cheap and clones share the same underlying histogram.
#[derive(Clone)]
pub struct Timer {
    name: Arc<str>,
    histogram: Histogram,
    created: Instant,
}

impl Timer {
    /// Wrap a histogram that is already registered under `name`
    pub fn new(name: impl Into<Arc<str>>, histogram: Histogram) -> Self {
        Self {
            name: name.into(),
            histogram,
            created: Instant::now(),
        }
    }

    /// Fully-qualified metric name this timer is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start timing a unit of work
    ///
    /// The elapsed time is recorded when the returned context is dropped, so
    /// the sample lands on every exit path (early return, `?`, panic unwind,
    /// or a cancelled future).
    pub fn time(&self) -> TimerContext {
        TimerContext {
            histogram: self.histogram.clone(),
            start: Instant::now(),
        }
    }

    /// Record an already-measured duration
    pub fn record(&self, duration: Duration) {
        self.histogram.observe(duration.as_secs_f64());
    }

    /// Number of recorded samples
    pub fn count(&self) -> u64 {
        self.histogram.get_sample_count()
    }

    /// Sum of all recorded samples
    pub fn total(&self) -> Duration {
        Duration::from_secs_f64(self.histogram.get_sample_sum().max(0.0))
    }

    /// Mean recorded duration, `Duration::ZERO` when nothing was recorded
    pub fn mean(&self) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((self.histogram.get_sample_sum() / count as f64).max(0.0))
    }

    /// Samples per second since this timer was created
    pub fn rate(&self) -> f64 {
        let elapsed = self.created.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.count() as f64 / elapsed
    }

    /// This timer's rate as a fraction of `other`'s rate
    ///
    /// Reads as `0.0` while `other` has not recorded anything.
    pub fn rate_ratio(&self, other: &Timer) -> f64 {
        let denominator = other.rate();
        if denominator == 0.0 || !denominator.is_finite() {
            return 0.0;
        }
        self.rate() / denominator
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("count", &self.count())
            .field("mean", &self.mean())
            .finish()
    }
}

/// In-flight measurement started by [`Timer::time`]
#[must_use = "the duration is recorded when the context is dropped"]
pub struct TimerContext {
    histogram: Histogram,
    start: Instant,
}

impl TimerContext {
    /// Time elapsed since the measurement started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimerContext {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
