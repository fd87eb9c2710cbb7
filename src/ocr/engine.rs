//! OCR Engines
//!
//! Defines the recognizer trait consumed by the pipeline and the Tesseract
//! command-line implementation.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::GrayImage;
use serde::Serialize;

use super::types::OcrError;
use crate::config::OcrConfig;

/// Text recognition engine.
///
/// Implementations are called from blocking worker threads and must not
/// assume an async runtime.
pub trait TextRecognizer: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Recognize the text in a binarized bitmap. `language` is a `+`-joined
    /// list of language codes recognized together.
    fn recognize_text(&self, bitmap: &GrayImage, language: &str) -> Result<String, OcrError>;

    /// Installation check, if the engine supports one
    fn diagnostics(&self, _language: &str) -> Option<EngineDiagnostics> {
        None
    }
}

/// Tesseract OCR invoked as a child process
pub struct TesseractEngine {
    engine_path: String,
    data_directory: Option<PathBuf>,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            engine_path: config.engine_path.clone(),
            data_directory: config.data_directory.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.engine_path);
        if let Some(dir) = &self.data_directory {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
    }

    /// First line of `tesseract --version`, if the binary runs
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.engine_path).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        // Older releases print the version on stderr
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        text.lines().next().map(|line| line.trim().to_string())
    }

    /// Languages the engine reports via `--list-langs`
    fn listed_languages(&self) -> Vec<String> {
        let output = match self.command().arg("--list-langs").output() {
            Ok(output) if output.status.success() => output,
            _ => return Vec::new(),
        };
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .skip(1) // "List of available languages ..."
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Check that the engine runs and that every language of `language_hint`
    /// has its trained data installed.
    pub fn diagnose(&self, language_hint: &str) -> EngineDiagnostics {
        let version = self.version();
        let codes = split_languages(language_hint);

        let languages = match &self.data_directory {
            Some(dir) => codes
                .iter()
                .map(|code| LanguageStatus {
                    code: code.to_string(),
                    installed: trained_data_path(dir, code).is_file(),
                })
                .collect(),
            None => {
                let listed = if version.is_some() {
                    self.listed_languages()
                } else {
                    Vec::new()
                };
                codes
                    .iter()
                    .map(|code| LanguageStatus {
                        code: code.to_string(),
                        installed: listed.iter().any(|l| l == code),
                    })
                    .collect()
            }
        };

        EngineDiagnostics {
            engine_path: self.engine_path.clone(),
            data_directory: self.data_directory.clone(),
            version,
            languages,
        }
    }
}

impl TextRecognizer for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize_text(&self, bitmap: &GrayImage, language: &str) -> Result<String, OcrError> {
        // Create temporary file for image
        let input_path = std::env::temp_dir().join(format!("ocr_input_{}.png", uuid::Uuid::new_v4()));

        bitmap
            .save_with_format(&input_path, image::ImageFormat::Png)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to write temp file: {}", e)))?;

        let output = self
            .command()
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output();

        let _ = std::fs::remove_file(&input_path);

        let output = output.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::EngineNotAvailable(format!("{} not found", self.engine_path))
            } else {
                OcrError::ProcessingError(format!("Failed to run tesseract: {}", e))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn diagnostics(&self, language: &str) -> Option<EngineDiagnostics> {
        Some(self.diagnose(language))
    }
}

/// Installation check result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDiagnostics {
    pub engine_path: String,
    pub data_directory: Option<PathBuf>,
    /// `None` when the engine binary could not be run
    pub version: Option<String>,
    pub languages: Vec<LanguageStatus>,
}

impl EngineDiagnostics {
    pub fn is_ready(&self) -> bool {
        self.version.is_some() && self.languages.iter().all(|l| l.installed)
    }

    pub fn missing_languages(&self) -> Vec<&str> {
        self.languages
            .iter()
            .filter(|l| !l.installed)
            .map(|l| l.code.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageStatus {
    pub code: String,
    pub installed: bool,
}

fn split_languages(hint: &str) -> Vec<&str> {
    hint.split('+')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .collect()
}

fn trained_data_path(dir: &Path, code: &str) -> PathBuf {
    dir.join(format!("{}.traineddata", code))
}

/// Scripted recognizer for tests
#[cfg(test)]
pub struct MockRecognizer {
    /// Returned for every call; `Err` text becomes a processing error
    pub response: Result<String, String>,
    pub calls: std::sync::Mutex<Vec<(u32, u32, String)>>,
}

#[cfg(test)]
impl MockRecognizer {
    pub fn returning(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl TextRecognizer for MockRecognizer {
    fn name(&self) -> &str {
        "mock"
    }

    fn recognize_text(&self, bitmap: &GrayImage, language: &str) -> Result<String, OcrError> {
        self.calls
            .lock()
            .unwrap()
            .push((bitmap.width(), bitmap.height(), language.to_string()));
        self.response.clone().map_err(OcrError::ProcessingError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(engine_path: &str, data_directory: Option<PathBuf>) -> TesseractEngine {
        TesseractEngine::new(&OcrConfig {
            engine_path: engine_path.to_string(),
            data_directory,
            ..OcrConfig::default()
        })
    }

    #[test]
    fn test_split_languages() {
        assert_eq!(split_languages("khm+eng"), vec!["khm", "eng"]);
        assert_eq!(split_languages(" eng "), vec!["eng"]);
        assert!(split_languages("").is_empty());
    }

    #[test]
    fn test_missing_binary_is_not_available() {
        let engine = engine_with("/nonexistent/tesseract-binary", None);
        let bitmap = GrayImage::new(4, 4);

        let result = engine.recognize_text(&bitmap, "eng");
        assert!(matches!(result, Err(OcrError::EngineNotAvailable(_))));
        assert!(engine.version().is_none());
    }

    #[test]
    fn test_diagnose_checks_trained_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), b"stub").unwrap();

        let engine = engine_with("/nonexistent/tesseract-binary", Some(dir.path().to_path_buf()));
        let diagnostics = engine.diagnose("khm+eng");

        assert!(diagnostics.version.is_none());
        assert!(!diagnostics.is_ready());
        assert_eq!(diagnostics.missing_languages(), vec!["khm"]);
        assert!(diagnostics.languages.iter().any(|l| l.code == "eng" && l.installed));
    }

    #[test]
    fn test_diagnose_without_engine_or_data_dir() {
        let engine = engine_with("/nonexistent/tesseract-binary", None);
        let diagnostics = engine.diagnose("khm+eng");

        assert_eq!(diagnostics.missing_languages(), vec!["khm", "eng"]);
    }
}
