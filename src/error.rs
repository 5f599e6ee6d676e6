//! Application error taxonomy and its HTTP mapping.
//!
//! Handlers return `Result<HttpResponse, AppError>`; actix-web turns the error side into an
//! `ErrorResponse` envelope through the `ResponseError` impl below. Messages carried by the
//! variants are shown to clients, so they never contain file paths or driver errors.

use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::ErrorResponse;

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing caller input, with per-field messages keyed by field name.
    #[error("{message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Admin-entered data (schema, customization, layout file) is unusable.
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    Render(String),
    #[error("{message}")]
    Rasterization { message: String, timed_out: bool },
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields,
        }
    }

    /// Validation failure on a single field.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.clone());
        Self::Validation { message, fields }
    }

    pub fn rasterization(message: impl Into<String>) -> Self {
        Self::Rasterization {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn render_timeout() -> Self {
        Self::Rasterization {
            message: "rendering timed out, please retry".to_string(),
            timed_out: true,
        }
    }

    /// Short machine-readable code used as the `error` field of the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::BadRequest(_) => "BadRequest",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::Configuration(_) => "ConfigurationError",
            Self::Render(_) => "RenderError",
            Self::Rasterization { .. } => "RasterizationError",
            Self::Database(_) => "DatabaseError",
            Self::Internal(_) => "InternalServerError",
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rasterization { .. })
    }

    fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "a database error occurred".to_string(),
            Self::Configuration(_) => {
                "template configuration is invalid, please contact an administrator".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION) => Self::Conflict("record already exists".to_string()),
                Some(PG_FOREIGN_KEY_VIOLATION) => {
                    Self::Conflict("record is referenced by other records".to_string())
                }
                _ => Self::Database(err),
            },
            _ => Self::Database(err),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Rasterization { timed_out: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration(_)
            | Self::Render(_)
            | Self::Rasterization { .. }
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = ErrorResponse::new(self.code(), &self.public_message());
        if let Self::Validation { fields, .. } = self {
            if !fields.is_empty() {
                body.fields = Some(fields.clone());
            }
        }
        body.retryable = self.is_retryable().then_some(true);
        HttpResponse::build(self.status_code()).json(body)
    }
}
