//! Pipeline and application error types.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single validation failure surfaced to the author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field path (None for draft-level errors).
    pub field: Option<String>,

    /// Error message.
    pub message: String,
}

impl ValidationError {
    /// Create a field-level error.
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(name.into()),
            message: message.into(),
        }
    }

    /// Create a draft-level error.
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Content store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The unique slug constraint rejected the write.
    #[error("slug already in use: {0}")]
    SlugTaken(String),

    #[error("content not found: {0}")]
    NotFound(String),

    #[error("content store timed out after {0:?}")]
    Timeout(Duration),

    #[error("content store error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Fatal publish failures.
///
/// Upload failures are not represented here; they travel as metadata on a
/// successful [`crate::content::PublishReport`].
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("no free slug for \"{base}\" after {attempts} attempts")]
    SlugCollisionExhausted { base: String, attempts: u32 },

    #[error("content not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl PublishError {
    /// Shorthand for a single field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        PublishError::Validation(vec![ValidationError::field(field, message)])
    }

    /// Validation errors carried by this error, if any.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            PublishError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// HTTP-facing application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ValidationError>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Publish(PublishError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Publish(PublishError::NotFound(_))
            | AppError::Publish(PublishError::Persistence(StoreError::NotFound(_)))
            | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Publish(PublishError::SlugCollisionExhausted { .. })
            | AppError::Publish(PublishError::Persistence(StoreError::SlugTaken(_))) => {
                StatusCode::CONFLICT
            }
            AppError::Publish(PublishError::Persistence(StoreError::Timeout(_))) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Publish(PublishError::Persistence(StoreError::Backend(_)))
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Backend details go to the log, not the client
        let error = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Publish(PublishError::Persistence(e @ StoreError::Backend(_))) => {
                tracing::error!(error = %e, "content store error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let errors = match self {
            AppError::Publish(PublishError::Validation(errors)) => errors,
            _ => Vec::new(),
        };

        (status, Json(ErrorBody { error, errors })).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
