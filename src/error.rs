//! Error types for routestat
//!
//! All errors implement `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Metric registration failed: {0}")]
    MetricsRegistration(#[from] prometheus::Error),

    #[error("Cannot register route '{route}': {reason}")]
    RouteRegistration { route: String, reason: String },

    #[error("Request metrics are disabled")]
    MetricsDisabled,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::MetricsRegistration(_)
            | Self::RouteRegistration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Self::MetricsDisabled => (StatusCode::NOT_FOUND, self.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_creates() {
        let err = AppError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_route_registration_error_names_route() {
        let err = AppError::RouteRegistration {
            route: "other".to_string(),
            reason: "collides with the fallback bucket".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot register route 'other': collides with the fallback bucket"
        );
    }

    #[test]
    fn test_prometheus_error_converts() {
        let err: AppError = prometheus::Error::Msg("duplicate".to_string()).into();
        assert!(matches!(err, AppError::MetricsRegistration(_)));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_config_error_response_status() {
        let response = AppError::Config("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_metrics_disabled_response_status() {
        let response = AppError::MetricsDisabled.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_route_registration_response_status() {
        let err = AppError::RouteRegistration {
            route: "".to_string(),
            reason: "empty".to_string(),
        };
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
