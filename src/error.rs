use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Error taxonomy for the HTTP API layer.
///
/// Each variant maps to exactly one HTTP status code; the mapping lives
/// in `IntoResponse` below so it is applied once instead of at every
/// call site.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("not the owner of this resource")]
    Forbidden,

    #[error("resource not found")]
    NotFound,

    #[error("resource expired")]
    Gone,

    #[error("password required")]
    Locked { original_name: String, size: u64 },

    #[error("upstream blob store failure: {0}")]
    Upstream(String),

    #[error("share code or room code allocation exhausted")]
    Collision,

    #[error("internal error")]
    Internal(#[from] eyre::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "requiresPassword", skip_serializing_if = "Option::is_none")]
    requires_password: Option<bool>,
    #[serde(rename = "originalName", skip_serializing_if = "Option::is_none")]
    original_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    message: msg,
                    requires_password: None,
                    original_name: None,
                    size: None,
                },
            ),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    message: "authentication required".into(),
                    requires_password: None,
                    original_name: None,
                    size: None,
                },
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    message: "not the owner of this resource".into(),
                    requires_password: None,
                    original_name: None,
                    size: None,
                },
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    message: "not found".into(),
                    requires_password: None,
                    original_name: None,
                    size: None,
                },
            ),
            ApiError::Gone => (
                StatusCode::GONE,
                ErrorBody {
                    message: "expired".into(),
                    requires_password: None,
                    original_name: None,
                    size: None,
                },
            ),
            ApiError::Locked {
                original_name,
                size,
            } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    message: "password required".into(),
                    requires_password: Some(true),
                    original_name: Some(original_name),
                    size: Some(size),
                },
            ),
            ApiError::Upstream(msg) => {
                error!(error = %msg, "upstream blob store failure");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        message: "upstream storage error".into(),
                        requires_password: None,
                        original_name: None,
                        size: None,
                    },
                )
            }
            ApiError::Collision => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    message: "code allocation exhausted, try again".into(),
                    requires_password: None,
                    original_name: None,
                    size: None,
                },
            ),
            ApiError::Internal(err) => {
                let correlation_id = Uuid::new_v4();
                error!(%correlation_id, error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: format!("internal error (correlation id {correlation_id})"),
                        requires_password: None,
                        original_name: None,
                        size: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
