//! JSON error responses for the API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::error;

use super::iso_timestamp;

/// Error returned by API handlers; rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request input (400).
    Validation(String),
    /// Requested record does not exist (404).
    NotFound(String),
    /// A refresh is already running (409).
    Conflict {
        message: String,
        started: Option<DateTime<Utc>>,
    },
    /// Store or other internal failure (500). The cause is logged, not sent.
    Internal(String),
}

impl ApiError {
    /// Log `cause` and produce a 500 with a client-facing `message`.
    pub fn internal(message: &str, cause: impl std::fmt::Display) -> Self {
        error!("{}: {}", message, cause);
        Self::Internal(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(message) | Self::NotFound(message) | Self::Internal(message) => {
                json!({ "error": message })
            }
            Self::Conflict { message, started } => json!({
                "error": message,
                "started": started.map(iso_timestamp),
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_validation_shape() {
        let response = ApiError::Validation("bad".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "bad" }));
    }

    #[tokio::test]
    async fn test_conflict_includes_started() {
        let response = ApiError::Conflict {
            message: "busy".into(),
            started: None,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"], "busy");
        assert!(json["started"].is_null());
    }

    #[tokio::test]
    async fn test_internal_hides_cause() {
        let response = ApiError::internal("Error al buscar emisores", "disk I/O error").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Error al buscar emisores");
    }
}
