//! API error types and their HTTP mappings.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use logsearch_store::error::StoreError;
use logsearch_store::search::SearchQueryError;

/// Failures that abort server startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema creation or migration failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Socket binding or other I/O failure.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Failures raised while handling a single request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Auth token missing or wrong. Maps to an empty-bodied 403 so the
    /// response never reveals which check failed.
    #[error("forbidden")]
    Forbidden,

    /// A search parameter failed validation.
    #[error(transparent)]
    BadQuery(#[from] SearchQueryError),

    /// The ingest endpoint was called with a method other than POST.
    #[error("ingest requires POST")]
    IngestMethod,

    /// The request body could not be read.
    #[error("failed to read request body")]
    BodyRead,

    /// Storage failure, including audit records that fail to parse.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// JSON body attached to 400 and 500 responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadQuery(_) | Self::IngestMethod => StatusCode::BAD_REQUEST,
            Self::BodyRead | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::BadQuery(_) | Self::IngestMethod => "bad_request",
            Self::BodyRead | Self::Store(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
            other => {
                let body = ErrorBody {
                    error: other.code(),
                    message: other.to_string(),
                };
                (other.status(), Json(body)).into_response()
            }
        }
    }
}

// --- tests ---
