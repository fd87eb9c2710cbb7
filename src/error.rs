//! Error types for the Region OCR server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ocr::OcrError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Upload error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Worker error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Ocr(e) => match e {
                OcrError::InvalidImage(_) => (
                    StatusCode::BAD_REQUEST,
                    "invalid_image",
                    "Uploaded file is not a readable image".to_string(),
                ),
                OcrError::EngineNotAvailable(_) => {
                    tracing::error!("OCR engine error: {}", e);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "engine_unavailable",
                        "OCR engine is not available".to_string(),
                    )
                }
                _ => {
                    tracing::error!("OCR error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ocr_error",
                        "OCR processing failed".to_string(),
                    )
                }
            },
            AppError::Multipart(e) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                format!("Failed to read upload: {}", e.body_text()),
            ),
            AppError::Join(e) => {
                tracing::error!("OCR worker failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
