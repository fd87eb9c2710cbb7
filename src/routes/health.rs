//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ocr::EngineDiagnostics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub engine: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<EngineDiagnostics>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline = state.pipeline();
    let engine = pipeline.engine_name().to_string();
    let language = pipeline.language_hint().to_string();

    let diagnostics = match tokio::task::spawn_blocking(move || pipeline.diagnostics()).await {
        Ok(diagnostics) => diagnostics,
        Err(e) => {
            tracing::warn!("Engine diagnostics failed: {}", e);
            None
        }
    };

    let ready = diagnostics.as_ref().map_or(true, EngineDiagnostics::is_ready);

    Json(HealthResponse {
        status: if ready { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        service: "region-ocr-server",
        engine,
        language,
        diagnostics,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health", get(health_check))
}
