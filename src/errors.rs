use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad sensor configuration (court list, facility id, header values).
    /// Fatal at setup, never retried.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Network failure or timeout talking to Eversports.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Eversports answered with a non-2xx status.
    #[error("Eversports returned HTTP {status}")]
    Upstream { status: u16 },

    /// Body was not JSON, or lacked the `slots` array. The raw body is kept
    /// for diagnosis.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String, body: String },

    /// A single slot record could not be interpreted.
    #[error("Malformed slot: {0}")]
    MalformedSlot(String),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Refresh cancelled: coordinator is shutting down")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            AppError::Transport(_)
            | AppError::Upstream { .. }
            | AppError::MalformedResponse { .. }
            | AppError::MalformedSlot(_)
            | AppError::UpdateFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SetupFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self);
        }

        (
            status,
            axum::Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let resp = AppError::NotFound("sensor 'x'".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_update_failed_maps_to_bad_gateway() {
        let resp = AppError::UpdateFailed("boom".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_message_includes_status() {
        let err = AppError::Upstream { status: 503 };
        assert_eq!(err.to_string(), "Eversports returned HTTP 503");
    }
}
