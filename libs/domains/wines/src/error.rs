use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WineError {
    /// Request payload failed schema or range checks
    #[error("{0}")]
    Validation(String),

    /// A collaborator the operation needs was not configured at startup
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector search failed: {0}")]
    VectorSearch(String),

    #[error("Model prediction failed: {0}")]
    Model(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Failed to load embeddings: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type WineResult<T> = Result<T, WineError>;

impl WineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, WineError::Validation(_))
    }
}

impl From<serde_json::Error> for WineError {
    fn from(err: serde_json::Error) -> Self {
        WineError::Internal(format!("JSON error: {}", err))
    }
}

/// Convert WineError to AppError for standardized HTTP error responses
impl From<WineError> for AppError {
    fn from(err: WineError) -> Self {
        match err {
            WineError::Validation(msg) => AppError::BadRequest(msg),
            WineError::Config(msg) => AppError::Configuration(msg),
            err @ (WineError::VectorSearch(_)
            | WineError::Model(_)
            | WineError::Ocr(_)
            | WineError::Storage(_)) => AppError::Upstream(err.to_string()),
            WineError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for WineError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
