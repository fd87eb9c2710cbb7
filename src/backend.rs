//! Backend forwarding
//!
//! Hands the recognition result and the original upload to the storage
//! backend. Forwarding is best-effort: the outcome is reported back to the
//! client, it never fails the OCR request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::config::BackendConfig;
use crate::ocr::Detection;

/// Forwarding error types
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Failed to serialize detections: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Everything the backend stores for one upload
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub project_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub image: Vec<u8>,
    pub detections: Vec<Detection>,
}

/// What the backend answered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardOutcome {
    /// HTTP status, `None` if the backend could not be reached
    pub status: Option<u16>,
    pub message: String,
}

#[async_trait]
pub trait DetectionForwarder: Send + Sync {
    async fn forward(&self, request: &ForwardRequest) -> ForwardOutcome;
}

/// Multipart HTTP forwarder
pub struct HttpForwarder {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpForwarder {
    pub fn new(config: &BackendConfig) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
        })
    }

    fn build_form(request: &ForwardRequest) -> Result<Form, ForwardError> {
        let detections = serde_json::to_string(&request.detections)?;

        let mut image = Part::bytes(request.image.clone()).file_name(request.filename.clone());
        if let Some(content_type) = &request.content_type {
            image = image.mime_str(content_type)?;
        }

        Ok(Form::new()
            .text("project_id", request.project_id.clone())
            .text("filename", request.filename.clone())
            .text("detections", detections)
            .part("images", image))
    }

    async fn try_forward(&self, request: &ForwardRequest) -> Result<ForwardOutcome, ForwardError> {
        let form = Self::build_form(request)?;

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Ok(ForwardOutcome {
            status: Some(status.as_u16()),
            message: if body.is_empty() {
                status.canonical_reason().unwrap_or("").to_string()
            } else {
                body
            },
        })
    }
}

#[async_trait]
impl DetectionForwarder for HttpForwarder {
    async fn forward(&self, request: &ForwardRequest) -> ForwardOutcome {
        match self.try_forward(request).await {
            Ok(outcome) => {
                tracing::info!(
                    "Forwarded '{}' to backend: status {:?}",
                    request.filename,
                    outcome.status
                );
                outcome
            }
            Err(e) => {
                tracing::warn!("Forwarding '{}' to {} failed: {}", request.filename, self.upload_url, e);
                ForwardOutcome {
                    status: None,
                    message: e.to_string(),
                }
            }
        }
    }
}
