//! Image OCR routes
//!
//! Endpoints:
//! - POST /images/ - Recognize text inside user-drawn boxes and forward the
//!   result to the storage backend
//!
//! The multipart form carries `image` (file), `annotations` (JSON array of
//! `[x1, y1, x2, y2]` boxes) and `project_id`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::backend::ForwardRequest;
use crate::error::{AppError, Result};
use crate::ocr::Detection;
use crate::state::AppState;

/// Create the image OCR router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/images", post(ocr_user_boxes))
        .route("/images/", post(ocr_user_boxes))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Response for a processed upload
#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub processing_result: Vec<Detection>,
    pub filename: String,
    /// Backend HTTP status, `null` if the backend was unreachable
    pub backend_status: Option<u16>,
    pub message: String,
}

struct UploadedImage {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

/// POST /images/
async fn ocr_user_boxes(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>> {
    let mut image: Option<UploadedImage> = None;
    let mut annotations: Option<String> = None;
    let mut project_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await?;
                tracing::debug!("Read {} bytes of image '{}'", data.len(), filename);
                image = Some(UploadedImage {
                    filename,
                    content_type,
                    data,
                });
            }
            "annotations" => annotations = Some(field.text().await?),
            "project_id" => project_id = Some(field.text().await?),
            _ => tracing::debug!("Ignoring multipart field '{}'", name),
        }
    }

    let project_id = project_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Project ID is required".to_string()))?;

    let boxes = parse_annotations(annotations.as_deref())?;

    let image = image.ok_or_else(|| {
        AppError::BadRequest("No image provided. Use field name 'image'".to_string())
    })?;

    tracing::info!(
        "OCR request for '{}' in project '{}' with {} boxes",
        image.filename,
        project_id,
        boxes.len()
    );

    // Recognition is CPU-bound and shells out to the engine
    let pipeline = state.pipeline();
    let data = image.data.clone();
    let detections = tokio::task::spawn_blocking(move || pipeline.recognize(&data, &boxes)).await??;

    tracing::info!(
        "Recognized {} regions in '{}'",
        detections.len(),
        image.filename
    );

    let outcome = state
        .forwarder()
        .forward(&ForwardRequest {
            project_id,
            filename: image.filename.clone(),
            content_type: image.content_type,
            image: image.data.to_vec(),
            detections: detections.clone(),
        })
        .await;

    Ok(Json(OcrResponse {
        processing_result: detections,
        filename: image.filename,
        backend_status: outcome.status,
        message: outcome.message,
    }))
}

/// Parse the annotations field into a list of candidate boxes.
///
/// Only the outer shape is checked here; individual boxes are validated by
/// the pipeline, which skips malformed ones.
fn parse_annotations(raw: Option<&str>) -> Result<Vec<Value>> {
    let invalid = || AppError::BadRequest("Invalid annotations JSON".to_string());
    let raw = raw.ok_or_else(invalid)?;

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(boxes)) => Ok(boxes),
        _ => Err(invalid()),
    }
}
