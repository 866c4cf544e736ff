// Error types: domain errors for the cleaning pipeline and the HTTP error
// surface of the dashboard.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while cleaning the raw dataset.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("unparseable price in column '{column}': {value:?}")]
    InvalidPrice { column: &'static str, value: String },

    #[error("missing value in required column '{0}'")]
    MissingValue(&'static str),

    #[error("raw dataset is missing required column '{0}'")]
    MissingColumn(&'static str),

    // csv::Error already prefixes its own message
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    BadRequest(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::BadRequest(message) => {
                tracing::warn!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
        };

        (status, error_message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
