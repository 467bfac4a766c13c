use crate::access::DenyReason;
use crate::store::StoreError;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use std::sync::PoisonError;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AppError {

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(DenyReason),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Json rejection: {0}")]
    JsonRejection(#[from] JsonRejection),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_)      => StatusCode::NOT_FOUND,
            AppError::Forbidden(_)     => StatusCode::FORBIDDEN,
            AppError::Validation(_)    => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_)    => StatusCode::BAD_REQUEST,
            AppError::Conflict(_)      => StatusCode::CONFLICT,
            AppError::SerdeError(_)    => StatusCode::BAD_REQUEST,
            AppError::JsonRejection(r) => r.status(),
            _                          => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a gate denial onto the error the handlers surface.
    pub fn denied(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Forbidden(other),
        }
    }
}

impl<T> From<PoisonError<T>> for AppError {
    fn from(e: PoisonError<T>) -> Self {
        AppError::Internal(format!("Poison error: {:?}", e.to_string()))
    }
}

impl From<serde_urlencoded::de::Error> for AppError {
    fn from(e: serde_urlencoded::de::Error) -> Self {
        AppError::BadRequest(format!("invalid form body: {}", e))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    pub code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let message = match self {
            AppError::JsonRejection(rej) => rej.body_text(),
            other                        => other.to_string(),
        };
        (status, axum::Json(ErrorResponse { message, code: status.as_u16() })).into_response()
    }
}

/// Same error as [`AppError`], rendered as plain text for the HTML pages.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(e: AppError) -> Self {
        PageError(e)
    }
}

impl From<StoreError> for PageError {
    fn from(e: StoreError) -> Self {
        PageError(e.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "page request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}
