use crate::metrics::{STORE_FAILURES_TOTAL, VALIDATION_FAILURES_TOTAL};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Machine-readable error body returned by every endpoint.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            Error::Validation(msg) => {
                VALIDATION_FAILURES_TOTAL.inc();
                debug!("Rejected request: {}", msg);
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            Error::NotFound { .. } => {
                debug!("{}", self);
                (StatusCode::NOT_FOUND, "not_found", self.to_string())
            }
            _ => {
                STORE_FAILURES_TOTAL.inc();
                error!("Store error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_error",
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: kind, message })).into_response()
    }
}
