//! OCR Module
//!
//! Box-segmented text recognition: the caller supplies an image and a list
//! of user-drawn regions, each region is cropped, binarized and passed to
//! the OCR engine on its own.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use region_ocr_server::config::OcrConfig;
//! use region_ocr_server::ocr::{RecognitionPipeline, TesseractEngine};
//!
//! let config = OcrConfig::default();
//! let engine = Arc::new(TesseractEngine::new(&config));
//! let pipeline = RecognitionPipeline::new(&config, engine);
//!
//! let boxes = vec![serde_json::json!([50, 50, 350, 150])];
//! let detections = pipeline.recognize(&image_bytes, &boxes)?;
//! ```

mod engine;
mod pipeline;
mod preprocess;
mod types;

pub use engine::{EngineDiagnostics, LanguageStatus, TesseractEngine, TextRecognizer};
pub use pipeline::{decode_image, encode_png_base64, normalize_text, RecognitionPipeline};
pub use preprocess::{binarize_otsu, denoise_nl_means, preprocess, to_luminance, DenoiseParams};
pub use types::{Detection, OcrError, Region, RegionOutcome, SkipReason};

#[cfg(test)]
pub use engine::MockRecognizer;
