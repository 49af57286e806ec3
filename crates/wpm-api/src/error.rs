use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::guard::AuthError;
use crate::session::SessionError;

/// Structured error body returned by every failing endpoint except the
/// login redirect.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Page routes answer this with a redirect to the login form.
    #[error("authentication required: {0}")]
    Unauthenticated(SessionError),

    /// JSON endpoints answer a missing session with 401 instead.
    #[error("authentication required")]
    Unauthorized,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Forbidden(#[from] AuthError),

    #[error("{0}")]
    NotFound(&'static str),

    /// Store failure with a fixed client-facing message.
    #[error("{0}")]
    SaveFailed(&'static str),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(e) => ApiError::Store(e),
            other => ApiError::Unauthenticated(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthenticated(reason) => {
                debug!("Redirecting to login: {}", reason);
                return Redirect::to("/login").into_response();
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_MISSING",
                "Please log in to continue".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
            ),
            ApiError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, "PERMISSION_DENIED", reason.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.to_string()),
            ApiError::SaveFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.to_string())
            }
            ApiError::Store(e) => {
                error!("Store error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { code, message })).into_response()
    }
}
