//! Routestat HTTP server
//!
//! Starts an Axum web server with per-route request metrics and server spans.

use clap::Parser;
use routestat::cli::{Cli, Command, generate_config_template};
use routestat::{config::Config, handlers, telemetry};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                eprintln!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    let config = Arc::new(Config::from_file(&cli.config)?);

    telemetry::init(&config.observability.log_level);

    tracing::info!(
        metrics_enabled = config.metrics.enabled,
        namespace = %config.metrics.namespace(),
        tracing_enabled = config.tracing.enabled,
        "Starting Routestat server on {}:{}",
        config.server.host,
        config.server.port
    );

    let state = handlers::AppState::new(config.clone())?;
    let app = handlers::router(state);

    let addr = config.socket_addr()?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("Request summary available at http://{}/metrics/summary", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
