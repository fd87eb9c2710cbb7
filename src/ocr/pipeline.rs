//! Box-segmented recognition pipeline
//!
//! Decodes an image once, then crops, preprocesses and recognizes every
//! user-drawn region independently. A bad region never aborts the batch:
//! malformed or empty regions are skipped and engine failures become empty
//! text.

use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, GrayImage};
use serde_json::Value;

use super::{
    engine::{EngineDiagnostics, TextRecognizer},
    preprocess::{preprocess, DenoiseParams},
    types::{Detection, OcrError, Region, RegionOutcome, SkipReason},
};
use crate::config::OcrConfig;

/// Stateless orchestrator shared between requests
pub struct RecognitionPipeline {
    engine: Arc<dyn TextRecognizer>,
    language_hint: String,
    denoise: DenoiseParams,
}

impl RecognitionPipeline {
    pub fn new(config: &OcrConfig, engine: Arc<dyn TextRecognizer>) -> Self {
        Self {
            engine,
            language_hint: config.language_hint.clone(),
            denoise: config.denoise,
        }
    }

    pub fn language_hint(&self) -> &str {
        &self.language_hint
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Blocking: may spawn the engine binary
    pub fn diagnostics(&self) -> Option<EngineDiagnostics> {
        self.engine.diagnostics(&self.language_hint)
    }

    /// Recognize text in each region, in input order.
    ///
    /// Only an undecodable image fails the call.
    pub fn recognize(&self, image_bytes: &[u8], regions: &[Value]) -> Result<Vec<Detection>, OcrError> {
        Ok(self
            .recognize_outcomes(image_bytes, regions)?
            .into_iter()
            .filter_map(RegionOutcome::into_detection)
            .collect())
    }

    /// Same as [`recognize`](Self::recognize) but keeps one outcome per input
    /// region, including skipped ones.
    pub fn recognize_outcomes(
        &self,
        image_bytes: &[u8],
        regions: &[Value],
    ) -> Result<Vec<RegionOutcome>, OcrError> {
        let image = decode_image(image_bytes)?;
        tracing::debug!(
            "Decoded {}x{} image, processing {} regions",
            image.width(),
            image.height(),
            regions.len()
        );

        let outcomes: Vec<RegionOutcome> = regions
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let outcome = self.process_region(&image, value);
                match &outcome {
                    RegionOutcome::Skipped(reason) => {
                        tracing::debug!("Region {} skipped: {:?}", index, reason)
                    }
                    RegionOutcome::Failed { error, .. } => {
                        tracing::warn!("OCR failed for region {}: {}", index, error)
                    }
                    RegionOutcome::Recognized(_) => {}
                }
                outcome
            })
            .collect();

        Ok(outcomes)
    }

    fn process_region(&self, image: &DynamicImage, value: &Value) -> RegionOutcome {
        let Some(region) = Region::from_value(value) else {
            return RegionOutcome::Skipped(SkipReason::Malformed);
        };

        let clamped = region.clamp_to(image.width(), image.height());
        if clamped.is_empty() {
            return RegionOutcome::Skipped(SkipReason::EmptyCrop);
        }

        let crop = image.crop_imm(
            clamped.x1 as u32,
            clamped.y1 as u32,
            clamped.width(),
            clamped.height(),
        );
        let binary = preprocess(&crop, &self.denoise);

        let recognized = self
            .engine
            .recognize_text(&binary, &self.language_hint)
            .map(|raw| normalize_text(&raw));

        let cropped_image_base64 = match encode_png_base64(&binary) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("Failed to encode crop {:?}: {}", clamped, e);
                return RegionOutcome::Skipped(SkipReason::EncodeFailed);
            }
        };

        match recognized {
            Ok(extracted_text) => RegionOutcome::Recognized(Detection {
                box_coordinates: clamped,
                extracted_text,
                cropped_image_base64,
            }),
            Err(e) => RegionOutcome::Failed {
                detection: Detection {
                    box_coordinates: clamped,
                    extracted_text: String::new(),
                    cropped_image_base64,
                },
                error: e.to_string(),
            },
        }
    }
}

/// Decode encoded image bytes into an RGB bitmap.
pub fn decode_image(image_bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| OcrError::InvalidImage(e.to_string()))?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Collapse whitespace runs (newlines included) into single spaces and trim.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Encode a bitmap as PNG, then standard base64.
pub fn encode_png_base64(bitmap: &GrayImage) -> Result<String, OcrError> {
    let mut buffer = Vec::new();
    bitmap
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| OcrError::EncodingError(e.to_string()))?;
    Ok(BASE64.encode(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::MockRecognizer;
    use image::{Rgb, RgbImage};
    use serde_json::json;

    fn fast_config() -> OcrConfig {
        OcrConfig {
            denoise: DenoiseParams {
                strength: 10.0,
                template_window: 3,
                search_window: 5,
            },
            ..OcrConfig::default()
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            if (y / 4) % 2 == 0 && x % 3 != 0 {
                Rgb([15, 15, 15])
            } else {
                Rgb([245, 245, 245])
            }
        });
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn pipeline_with(engine: Arc<MockRecognizer>) -> RecognitionPipeline {
        RecognitionPipeline::new(&fast_config(), engine)
    }

    fn decode_detection_image(detection: &Detection) -> GrayImage {
        let bytes = BASE64.decode(&detection.cropped_image_base64).unwrap();
        image::load_from_memory(&bytes).unwrap().to_luma8()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Hello\n\tWorld  !"), "Hello World !");
        assert_eq!(normalize_text("  \n "), "");
        assert_eq!(normalize_text("\u{1780}\u{17B6}\n\nabc\r\n"), "\u{1780}\u{17B6} abc");
    }

    #[test]
    fn test_one_detection_per_region_in_order() {
        let engine = Arc::new(MockRecognizer::returning("Sample\nText  123\n"));
        let pipeline = pipeline_with(engine.clone());
        let regions = vec![json!([0, 0, 20, 10]), json!([10, 5, 40, 30]), json!([2, 2, 6, 6])];

        let detections = pipeline.recognize(&png_bytes(40, 30), &regions).unwrap();

        assert_eq!(detections.len(), 3);
        assert_eq!(detections[0].box_coordinates, Region::new(0, 0, 20, 10));
        assert_eq!(detections[1].box_coordinates, Region::new(10, 5, 40, 30));
        assert_eq!(detections[2].box_coordinates, Region::new(2, 2, 6, 6));
        assert!(detections.iter().all(|d| d.extracted_text == "Sample Text 123"));

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls[0], (20, 10, "khm+eng".to_string()));
        assert_eq!(calls[1], (30, 25, "khm+eng".to_string()));
    }

    #[test]
    fn test_out_of_bounds_region_is_clamped() {
        let pipeline = pipeline_with(Arc::new(MockRecognizer::returning("x")));
        let detections = pipeline
            .recognize(&png_bytes(100, 100), &[json!([0, 0, 500, 500])])
            .unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].box_coordinates, Region::new(0, 0, 100, 100));
        assert_eq!(decode_detection_image(&detections[0]).dimensions(), (100, 100));
    }

    #[test]
    fn test_mixed_malformed_and_empty_regions() {
        let pipeline = pipeline_with(Arc::new(MockRecognizer::returning("ok")));
        let regions = vec![json!([10, 10, 50, 50]), json!("bad"), json!([5, 5, 5, 5])];

        let outcomes = pipeline.recognize_outcomes(&png_bytes(60, 60), &regions).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], RegionOutcome::Recognized(_)));
        assert!(matches!(outcomes[1], RegionOutcome::Skipped(SkipReason::Malformed)));
        assert!(matches!(outcomes[2], RegionOutcome::Skipped(SkipReason::EmptyCrop)));

        let detections = pipeline.recognize(&png_bytes(60, 60), &regions).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].box_coordinates, Region::new(10, 10, 50, 50));
    }

    #[test]
    fn test_fully_outside_region_is_skipped() {
        let engine = Arc::new(MockRecognizer::returning("never"));
        let pipeline = pipeline_with(engine.clone());

        let outcomes = pipeline
            .recognize_outcomes(&png_bytes(30, 30), &[json!([40, 40, 80, 80])])
            .unwrap();

        assert!(matches!(outcomes[0], RegionOutcome::Skipped(SkipReason::EmptyCrop)));
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_engine_failure_yields_empty_text() {
        let pipeline = pipeline_with(Arc::new(MockRecognizer::failing("language data missing")));
        let regions = vec![json!([0, 0, 10, 10]), json!([10, 10, 20, 20])];

        let outcomes = pipeline.recognize_outcomes(&png_bytes(20, 20), &regions).unwrap();
        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            match outcome {
                RegionOutcome::Failed { detection, error } => {
                    assert_eq!(detection.extracted_text, "");
                    assert!(!detection.cropped_image_base64.is_empty());
                    assert!(error.contains("language data missing"));
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_image_fails_whole_call() {
        let pipeline = pipeline_with(Arc::new(MockRecognizer::returning("x")));
        let result = pipeline.recognize(b"definitely not an image", &[json!([0, 0, 1, 1])]);
        assert!(matches!(result, Err(OcrError::InvalidImage(_))));
    }

    #[test]
    fn test_crop_payload_is_binary_png() {
        let pipeline = pipeline_with(Arc::new(MockRecognizer::returning("")));
        let detections = pipeline
            .recognize(&png_bytes(48, 32), &[json!([4, 2, 44, 30])])
            .unwrap();

        let decoded = decode_detection_image(&detections[0]);
        assert_eq!(decoded.dimensions(), (40, 28));
        assert!(decoded.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let pipeline = pipeline_with(Arc::new(MockRecognizer::returning("same")));
        let bytes = png_bytes(32, 32);
        let regions = vec![json!([1, 1, 30, 20]), json!([8.7, 3.2, 25.9, 31])];

        let first = pipeline.recognize(&bytes, &regions).unwrap();
        let second = pipeline.recognize(&bytes, &regions).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[1].box_coordinates, Region::new(8, 3, 25, 31));
    }
}
