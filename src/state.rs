//! Application state management

use std::sync::Arc;

use crate::backend::DetectionForwarder;
use crate::config::Config;
use crate::ocr::RecognitionPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pipeline: Arc<RecognitionPipeline>,
    forwarder: Arc<dyn DetectionForwarder>,
}

impl AppState {
    pub fn new(
        config: Config,
        pipeline: RecognitionPipeline,
        forwarder: Arc<dyn DetectionForwarder>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline: Arc::new(pipeline),
                forwarder,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get a handle to the recognition pipeline, for moving into worker threads
    pub fn pipeline(&self) -> Arc<RecognitionPipeline> {
        Arc::clone(&self.inner.pipeline)
    }

    /// Get the backend forwarder
    pub fn forwarder(&self) -> &dyn DetectionForwarder {
        self.inner.forwarder.as_ref()
    }
}
