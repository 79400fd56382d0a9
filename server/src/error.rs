use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad numeric input, bad file type, or unusable extracted values.
    #[error("{0}")]
    Validation(String),

    #[error("No W-2 file uploaded. Attach an image or PDF in the 'w2Image' field.")]
    MissingFile,

    /// Missing server credential. The detail is logged, never returned.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The vision model call failed or returned nothing usable.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) | AppError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message sent to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Configuration(_) => "Server is not configured for W-2 extraction".to_string(),
            AppError::Upstream(_) => "Failed to process W-2 image. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}
