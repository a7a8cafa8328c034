//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::services::gateway::GatewayError;
use crate::services::poller::PollError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream submission failed: {0}")]
    UpstreamSubmissionFailed(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Job store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::UpstreamSubmissionFailed(_) | ApiError::ProviderUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing message and upstream diagnostics.
    fn message_and_details(&self) -> (String, Option<String>) {
        match self {
            ApiError::InvalidRequest(msg) => (msg.clone(), None),
            ApiError::Unauthorized(msg) => (msg.clone(), None),
            ApiError::UpstreamSubmissionFailed(detail) => {
                ("Upstream submission failed".to_string(), Some(detail.clone()))
            }
            ApiError::ProviderUnavailable(detail) => {
                ("Provider unavailable".to_string(), Some(detail.clone()))
            }
            ApiError::StoreUnavailable(detail) => {
                ("Job store unavailable".to_string(), Some(detail.clone()))
            }
            ApiError::Internal(detail) => {
                ("An internal error occurred".to_string(), Some(detail.clone()))
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            GatewayError::UpstreamSubmissionFailed { attempts, detail } => {
                ApiError::UpstreamSubmissionFailed(format!(
                    "{} (after {} attempts)",
                    detail, attempts
                ))
            }
            err @ GatewayError::UnusableJobId { .. } => {
                ApiError::UpstreamSubmissionFailed(err.to_string())
            }
            GatewayError::StoreUnavailable { source, .. } => {
                ApiError::StoreUnavailable(source.to_string())
            }
        }
    }
}

impl From<PollError> for ApiError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            PollError::ProviderUnavailable(detail) => ApiError::ProviderUnavailable(detail),
            PollError::Store(e) => ApiError::StoreUnavailable(e.to_string()),
            PollError::Interrupted(detail) => ApiError::Internal(detail),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error, details) = self.message_and_details();

        // Don't expose upstream diagnostics in production
        let details = if std::env::var("ENVIRONMENT")
            .map(|e| e.eq_ignore_ascii_case("production"))
            .unwrap_or(false)
        {
            None
        } else {
            details
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serial_test::serial;

    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::invalid_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::UpstreamSubmissionFailed("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::ProviderUnavailable("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::StoreUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_body_carries_details_outside_production() {
        std::env::remove_var("ENVIRONMENT");
        let (status, body) =
            body_json(ApiError::UpstreamSubmissionFailed("overloaded".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Upstream submission failed");
        assert_eq!(body["details"], "overloaded");
    }

    #[tokio::test]
    #[serial]
    async fn test_body_hides_details_in_production() {
        std::env::set_var("ENVIRONMENT", "production");
        let (_, body) = body_json(ApiError::StoreUnavailable("redis down".into())).await;
        std::env::remove_var("ENVIRONMENT");

        assert_eq!(body["error"], "Job store unavailable");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_invalid_request_has_no_details() {
        let (status, body) = body_json(ApiError::invalid_request("url is required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "url is required");
        assert!(body.get("details").is_none());
    }
}
