use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Failed to decode input image: {0}")]
    InputDecodeError(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Failed to encode output image: {0}")]
    EncodeError(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Archive collaborator failed: {0}")]
    CollaboratorError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PrepError {
    /// Machine-readable error code returned to HTTP clients
    pub fn code(&self) -> &'static str {
        match self {
            PrepError::InputDecodeError(_) => "INPUT_DECODE_ERROR",
            PrepError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            PrepError::EncodeError(_) => "ENCODE_ERROR",
            PrepError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            PrepError::MissingFile => "MISSING_FILE",
            PrepError::InvalidRequest(_) => "INVALID_REQUEST",
            PrepError::CollaboratorError(_) => "COLLABORATOR_ERROR",
            PrepError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PrepError::InputDecodeError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PrepError::ConfigurationError(_) => StatusCode::BAD_REQUEST,
            PrepError::EncodeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PrepError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PrepError::MissingFile => StatusCode::BAD_REQUEST,
            PrepError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PrepError::CollaboratorError(_) => StatusCode::BAD_GATEWAY,
            PrepError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<image::ImageError> for PrepError {
    fn from(err: image::ImageError) -> Self {
        PrepError::InputDecodeError(err.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for PrepError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}
