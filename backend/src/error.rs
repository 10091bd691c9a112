//! Application error handling
//!
//! This module provides unified error handling for the API,
//! converting internal errors to appropriate HTTP responses.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use folio_shared::{validation::ValidationError, AuthError, ErrorDetail, ErrorResponse};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// API error type that can be converted to HTTP responses
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many failed login attempts")]
    RateLimited { retry_after: Duration },

    #[error("Too many requests")]
    TooManyRequests { retry_after: Duration },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            field: None,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::RateLimited { retry_after } => ApiError::RateLimited { retry_after },
            AuthError::TokenInvalid(e) => ApiError::Unauthorized(format!("Invalid token: {}", e)),
            err @ (AuthError::System(_) | AuthError::RandomSource(_)) => {
                ApiError::Internal(anyhow::Error::new(err))
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation {
            message: err.message,
            field: Some(err.field),
        }
    }
}

/// Report the first failing field, by name, from a `validator` derive
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let first = field_errors
            .iter()
            .map(|(field, errs)| (field.to_string(), errs))
            .min_by(|a, b| a.0.cmp(&b.0));

        match first {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                ValidationError::new(&field, &message).into()
            }
            None => ApiError::validation("Invalid request"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut field = None;
        let mut seconds_remaining = None;

        let (status, code, message) = match self {
            ApiError::Validation { message, field: f } => {
                field = f;
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::RateLimited { retry_after } => {
                seconds_remaining = Some(whole_seconds(retry_after));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    "Too many failed login attempts. Please try again later.".to_string(),
                )
            }
            ApiError::TooManyRequests { retry_after } => {
                seconds_remaining = Some(whole_seconds(retry_after));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "TOO_MANY_REQUESTS",
                    "Too many requests".to_string(),
                )
            }
            ApiError::Internal(err) => {
                error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
                seconds_remaining,
            },
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = seconds_remaining {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Round up so clients never retry a second early
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
