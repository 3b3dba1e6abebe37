//! Request summary endpoint
//!
//! `GET /metrics/summary` serves the current [`RequestSummary`] as JSON.

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::metrics::summary::RequestSummary;
use axum::{Json, extract::State};

/// Summary handler
///
/// Returns 404 with an error body when request metrics are disabled.
pub async fn handler(State(state): State<AppState>) -> AppResult<Json<RequestSummary>> {
    let summary = state.metrics().summary().ok_or(AppError::MetricsDisabled)?;

    tracing::debug!(
        routes = summary.routes.len(),
        top = summary.ranked.first().map(|s| s.route.as_str()).unwrap_or(""),
        "Serving request summary"
    );

    Ok(Json(summary))
}
