//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Request metrics status: "enabled" or "disabled"
    pub metrics: &'static str,
    /// Requests in flight, including this one; absent when metrics are disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_requests: Option<i64>,
}

/// Health check handler
///
/// Always returns 200 OK.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let active_requests = state.metrics().state().map(|s| s.active_requests());

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            metrics: if state.metrics().is_enabled() {
                "enabled"
            } else {
                "disabled"
            },
            active_requests,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn create_test_state(metrics_enabled: bool) -> AppState {
        let toml = format!(
            "[server]\nhost = \"127.0.0.1\"\nport = 3000\n[metrics]\nenabled = {}\n",
            metrics_enabled
        );
        let config: Config = toml.parse().expect("should parse test config");
        AppState::new(Arc::new(config)).expect("should create AppState")
    }

    #[tokio::test]
    async fn test_health_handler_returns_ok() {
        let (status, Json(body)) = handler(State(create_test_state(true))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "OK");
        assert_eq!(body.metrics, "enabled");
        assert_eq!(body.active_requests, Some(0));
    }

    #[tokio::test]
    async fn test_health_handler_reports_disabled_metrics() {
        let (status, Json(body)) = handler(State(create_test_state(false))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.metrics, "disabled");
        assert!(body.active_requests.is_none());
    }
}
