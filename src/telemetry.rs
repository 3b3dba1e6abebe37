//! Logging setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Default filter directives for `level`
pub fn default_filter(level: &str) -> String {
    format!("routestat={},tower_http=debug", level)
}

/// Initialize the tracing subscriber
///
/// Only the first call per process has an effect. `RUST_LOG` takes
/// precedence over `default_level`.
///
/// ```no_run
/// routestat::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let directives = default_filter("debug");
        assert_eq!(directives, "routestat=debug,tower_http=debug");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
