use crate::access::AccessError;
use crate::calendar::RangeError;
use crate::lifecycle::LifecycleError;
use crate::password::PasswordError;
use crate::scoring::ScoringError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

const TRY_AGAIN: &str = "something went wrong, please try again";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    DbError(#[from] sqlx::Error),
    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DbError(_) | AppError::Scoring(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    pub fn event_not_found() -> Self {
        AppError::NotFound("event not found".to_string())
    }

    pub fn incorrect_password() -> Self {
        AppError::Unauthorized("incorrect password".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            TRY_AGAIN.to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RangeError> for AppError {
    fn from(err: RangeError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Hash(_) => AppError::Internal(err.to_string()),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            LifecycleError::AlreadyLocked
            | LifecycleError::NotLocked
            | LifecycleError::DateOutOfRange { .. } => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        if err.is_unauthenticated() {
            AppError::Unauthorized(err.to_string())
        } else {
            AppError::Forbidden(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}
