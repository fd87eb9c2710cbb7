//! Region OCR Server
//!
//! Accepts an image with user-drawn boxes, recognizes the text inside each
//! box and forwards the result to the storage backend.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use region_ocr_server::backend::HttpForwarder;
use region_ocr_server::config::Config;
use region_ocr_server::ocr::{RecognitionPipeline, TesseractEngine};
use region_ocr_server::routes;
use region_ocr_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "region_ocr_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Region OCR Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("OCR engine: {}", config.ocr.engine_path);
    tracing::info!("OCR language: {}", config.ocr.language_hint);
    tracing::info!("Backend upload URL: {}", config.backend.upload_url);

    let engine = Arc::new(TesseractEngine::new(&config.ocr));
    log_engine_diagnostics(engine.clone(), config.ocr.language_hint.clone()).await;

    let pipeline = RecognitionPipeline::new(&config.ocr, engine);
    let forwarder = HttpForwarder::new(&config.backend).context("Failed to build backend client")?;

    // Build CORS layer
    let origin: HeaderValue = config
        .server
        .cors_origin
        .parse()
        .with_context(|| format!("Invalid CORS origin '{}'", config.server.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT]);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let max_upload_bytes = config.server.max_upload_bytes;

    let app_state = AppState::new(config, pipeline, Arc::new(forwarder));

    // Build router
    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::images::router(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    tracing::info!("Region OCR Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Report missing engine pieces at startup; the server still starts so the
/// health endpoint can be queried.
async fn log_engine_diagnostics(engine: Arc<TesseractEngine>, language_hint: String) {
    let diagnostics = match tokio::task::spawn_blocking(move || engine.diagnose(&language_hint)).await {
        Ok(diagnostics) => diagnostics,
        Err(e) => {
            tracing::warn!("Engine check failed: {}", e);
            return;
        }
    };

    match &diagnostics.version {
        Some(version) => tracing::info!("Found {}", version),
        None => tracing::warn!("Tesseract not runnable at '{}'", diagnostics.engine_path),
    }

    let missing = diagnostics.missing_languages();
    if !missing.is_empty() {
        tracing::warn!("Missing language data: {}", missing.join(", "));
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
