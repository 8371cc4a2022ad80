use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::storage::StoreError;

/// AppError
///
/// The single failure taxonomy of the API. Every handler returns `Result<_, AppError>`
/// and every variant renders as `{"error": "<message>"}` with its matching status code.
#[derive(Error, Debug)]
pub enum AppError {
    /// No session cookie, or the session has expired.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the role is not in the operation's allowed set.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate username/email/slug, or a transition out of a terminal state.
    #[error("{0}")]
    Conflict(String),

    /// Missing or malformed fields, unparseable dates, malformed ids or bodies.
    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Persistence failures. Always surfaced to clients as a 500.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias used across handlers and workflows.
pub type AppResult<T> = Result<T, AppError>;

/// ErrorBody
///
/// Wire shape of every failure response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(_) | AppError::Store(_) => {
                // Details go to the log, never to the client.
                tracing::error!(error = %self, "request failed with internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
