//! Service status and node listing

use crate::handlers::AppState;
use crate::trace;
use axum::{Json, extract::State};
use opentelemetry::KeyValue;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK",
        service: state.config().tracing.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Host identifier used to namespace metrics
    pub namespace: String,
    pub cpus: usize,
    pub metrics_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub nodes: Vec<NodeInfo>,
}

/// `GET /nodes`
///
/// Lists the local node only.
pub async fn nodes(State(state): State<AppState>) -> Json<NodesResponse> {
    let nodes = vec![NodeInfo {
        namespace: state.config().metrics.namespace().to_string(),
        cpus: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        metrics_enabled: state.metrics().is_enabled(),
    }];

    trace::set_current_attribute(KeyValue::new("routestat.nodes", nodes.len() as i64));

    Json(NodesResponse { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn state() -> AppState {
        let config: Config =
            "[server]\nhost = \"127.0.0.1\"\nport = 3000\n[metrics]\nnamespace = \"web-01\"\n"
                .parse()
                .unwrap();
        AppState::new(Arc::new(config)).unwrap()
    }

    #[tokio::test]
    async fn test_status_reports_version() {
        let Json(body) = status(State(state())).await;
        assert_eq!(body.status, "OK");
        assert_eq!(body.service, "routestat");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_nodes_lists_local_node() {
        let Json(body) = nodes(State(state())).await;
        assert_eq!(body.nodes.len(), 1);
        assert_eq!(body.nodes[0].namespace, "web-01");
        assert!(body.nodes[0].cpus >= 1);
        assert!(body.nodes[0].metrics_enabled);
    }
}
