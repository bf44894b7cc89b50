//! Error taxonomy shared by the registry, the tree builder and the HTTP layer.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Bad or missing input supplied by the caller.
    #[error("{0}")]
    Validation(String),

    /// The repository identifier is already present on disk.
    #[error("repository already exists: {0}")]
    Conflict(String),

    /// Unknown repository id or file path.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external provider process could not be run or exited non-zero.
    #[error("{provider} failed: {detail}")]
    Provider {
        provider: &'static str,
        detail: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] ignore::Error),

    #[error("blocking task failed: {0}")]
    Blocking(String),
}

impl AppError {
    pub fn provider(provider: &'static str, detail: impl Into<String>) -> Self {
        AppError::Provider {
            provider,
            detail: detail.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Blocking(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider { .. }
            | AppError::Io(_)
            | AppError::Walk(_)
            | AppError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Server-side detail stays in the log; clients only see the reason phrase.
        let message = if status.is_server_error() {
            status.canonical_reason().unwrap_or("Internal Server Error").to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(json!({
            "error": {
                "status": status.as_u16(),
                "message": message,
            }
        }))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
