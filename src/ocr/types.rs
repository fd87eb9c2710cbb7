//! OCR Types
//!
//! Defines regions, detections and per-region outcomes of box-segmented OCR.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rectangle in image pixel coordinates, serialized as `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct Region {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl Region {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Coerce an untrusted JSON value into a region.
    ///
    /// Accepts an array of exactly four elements, each a number (truncated
    /// toward zero) or a string holding an integer. Returns `None` otherwise.
    pub fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() != 4 {
            return None;
        }

        let mut coords = [0i64; 4];
        for (slot, item) in coords.iter_mut().zip(items) {
            *slot = coerce_coordinate(item)?;
        }
        Some(Self::from(coords))
    }

    /// Order each axis and clamp to `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (i64::from(width), i64::from(height));
        Self {
            x1: self.x1.min(self.x2).clamp(0, w),
            y1: self.y1.min(self.y2).clamp(0, h),
            x2: self.x1.max(self.x2).clamp(0, w),
            y2: self.y1.max(self.y2).clamp(0, h),
        }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl From<[i64; 4]> for Region {
    fn from([x1, y1, x2, y2]: [i64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<Region> for [i64; 4] {
    fn from(region: Region) -> Self {
        [region.x1, region.y1, region.x2, region.y2]
    }
}

fn coerce_coordinate(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Output record for one recognized region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Clamped coordinates actually cropped
    pub box_coordinates: Region,
    /// Whitespace-normalized text, empty if nothing was recognized
    pub extracted_text: String,
    /// Base64 PNG of the binarized crop the engine saw
    pub cropped_image_base64: String,
}

/// Why a region produced no detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not four numeric values
    Malformed,
    /// Zero area after clamping to the image
    EmptyCrop,
    /// The binarized crop could not be encoded as PNG
    EncodeFailed,
}

/// Result of processing a single candidate region
#[derive(Debug, Clone)]
pub enum RegionOutcome {
    Skipped(SkipReason),
    Recognized(Detection),
    /// Engine failed; the detection carries empty text
    Failed { detection: Detection, error: String },
}

impl RegionOutcome {
    pub fn into_detection(self) -> Option<Detection> {
        match self {
            Self::Skipped(_) => None,
            Self::Recognized(detection) | Self::Failed { detection, .. } => Some(detection),
        }
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("OCR engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("Failed to encode image: {0}")]
    EncodingError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_region_from_integers() {
        let region = Region::from_value(&json!([50, 50, 350, 150])).unwrap();
        assert_eq!(region, Region::new(50, 50, 350, 150));
    }

    #[test]
    fn test_region_truncates_floats() {
        let region = Region::from_value(&json!([10.9, 20.2, -3.7, 40.999])).unwrap();
        assert_eq!(region, Region::new(10, 20, -3, 40));
    }

    #[test]
    fn test_region_accepts_integer_strings() {
        let region = Region::from_value(&json!(["1", " 2 ", 3, 4])).unwrap();
        assert_eq!(region, Region::new(1, 2, 3, 4));
    }

    #[test]
    fn test_region_rejects_malformed() {
        for value in [
            json!("bad"),
            json!([1, 2, 3]),
            json!([1, 2, 3, 4, 5]),
            json!([1, 2, "x", 4]),
            json!([1, 2, null, 4]),
            json!([1, true, 3, 4]),
            json!({"x1": 1, "y1": 2, "x2": 3, "y2": 4}),
        ] {
            assert!(Region::from_value(&value).is_none(), "accepted {}", value);
        }
    }

    #[test]
    fn test_clamp_to_bounds() {
        let region = Region::new(0, 0, 500, 500).clamp_to(100, 100);
        assert_eq!(region, Region::new(0, 0, 100, 100));

        let region = Region::new(-20, 30, 60, 90).clamp_to(50, 50);
        assert_eq!(region, Region::new(0, 30, 50, 50));
    }

    #[test]
    fn test_clamp_orders_swapped_corners() {
        let region = Region::new(80, 60, 20, 10).clamp_to(100, 100);
        assert_eq!(region, Region::new(20, 10, 80, 60));
    }

    #[test]
    fn test_empty_regions() {
        assert!(Region::new(5, 5, 5, 5).clamp_to(100, 100).is_empty());
        assert!(Region::new(200, 200, 300, 300).clamp_to(100, 100).is_empty());
        assert!(!Region::new(0, 0, 1, 1).clamp_to(100, 100).is_empty());
    }

    #[test]
    fn test_detection_serializes_box_as_array() {
        let detection = Detection {
            box_coordinates: Region::new(1, 2, 3, 4),
            extracted_text: "hi".to_string(),
            cropped_image_base64: "AAAA".to_string(),
        };
        let value = serde_json::to_value(&detection).unwrap();
        assert_eq!(value["box_coordinates"], json!([1, 2, 3, 4]));
        assert_eq!(value["extracted_text"], "hi");
        assert_eq!(value["cropped_image_base64"], "AAAA");
    }
}
