//! Command-line interface for Routestat
//!
//! Provides argument parsing and subcommand handling for the Routestat binary.

use clap::{Parser, Subcommand};

/// Per-route request metrics and server spans for HTTP services
#[derive(Parser)]
#[command(name = "routestat")]
#[command(version)]
#[command(about = "Per-route request metrics and server spans for HTTP services")]
#[command(
    long_about = "Routestat serves a small HTTP API instrumented with per-route request \
    timers, in-flight request tracking and W3C trace-context aware server spans, and \
    reports where request time goes at /metrics/summary."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Routestat Configuration
# ========================

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# ─────────────────────────────────────────────────────────────────────────────
# REQUEST METRICS
# ─────────────────────────────────────────────────────────────────────────────
#
# Every route gets a request timer and a percentage-of-total gauge. Requests
# to unregistered paths are counted under "other".

[metrics]
# Set to false to serve requests without any instrumentation
enabled = true

# Host identifier prefixed to every metric name.
# Must start with a letter; letters, digits, '_' and '-' only.
# Example: "web-01" yields metrics such as web_01_total_requests
namespace = "routestat"

# ─────────────────────────────────────────────────────────────────────────────
# SERVER SPANS
# ─────────────────────────────────────────────────────────────────────────────
#
# One span per request. A valid W3C `traceparent` header makes the span a
# child of the caller's trace; otherwise a new trace is started.

[tracing]
enabled = true

# Service name attached to every reported span
service_name = "routestat"

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG overrides this when set
log_level = "info"
"#
}
