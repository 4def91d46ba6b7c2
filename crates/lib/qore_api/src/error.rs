//! Application error types.
//!
//! Every failure leaves the API as the standard envelope
//! `{ "success": false, "message": ..., "error"?: ... }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use qore_core::auth::AuthError;
use qore_core::store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Detail of an internal error, attached to the 500 response as an
/// extension. Only [`expose_internal_detail`] ever puts it in the body.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

/// Response mapper for non-production routers: copies the detail of a 500
/// into the envelope's `error` field.
pub async fn expose_internal_detail(mut response: Response) -> Response {
    match response.extensions_mut().remove::<InternalErrorDetail>() {
        Some(InternalErrorDetail(detail)) => {
            let body = ErrorResponse {
                success: false,
                message: "Internal server error".into(),
                error: Some(serde_json::Value::String(detail)),
            };
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duplicate unique key. Reported as 400, not 409.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Validation failure without field detail.
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation { message, errors } => ErrorResponse {
                success: false,
                message,
                error: if errors.is_empty() {
                    None
                } else {
                    serde_json::to_value(errors).ok()
                },
            },
            AppError::NotFound(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::Conflict(m) => ErrorResponse {
                success: false,
                message: m,
                error: None,
            },
            AppError::Internal(detail) => {
                error!(error = %detail, "internal error");
                let body = ErrorResponse {
                    success: false,
                    message: "Internal server error".into(),
                    error: None,
                };
                let mut response = (status, Json(body)).into_response();
                response
                    .extensions_mut()
                    .insert(InternalErrorDetail(detail));
                return response;
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Database(e) => AppError::from(e),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => {
                AppError::Unauthorized("Invalid email or password".into())
            }
            AuthError::TokenError(msg) => AppError::Unauthorized(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
