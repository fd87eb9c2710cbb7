//! Configuration management for Region OCR Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::ocr::DenoiseParams;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Frontend origin allowed by CORS
    pub cors_origin: String,
    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,
}

/// OCR engine and preprocessing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Path to the tesseract executable (default: "tesseract" - uses PATH)
    pub engine_path: String,
    /// Directory holding `<lang>.traineddata` files
    pub data_directory: Option<PathBuf>,
    /// Language hint, `+`-joined (e.g. "khm+eng")
    pub language_hint: String,
    pub denoise: DenoiseParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Upload endpoint of the storage backend
    pub upload_url: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            engine_path: "tesseract".to_string(),
            data_directory: None,
            language_hint: "khm+eng".to_string(),
            denoise: DenoiseParams::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                cors_origin: "http://localhost:5173".to_string(),
                max_upload_bytes: 20 * 1024 * 1024,
            },
            ocr: OcrConfig::default(),
            backend: BackendConfig {
                upload_url: "http://127.0.0.1:3000/images/upload".to_string(),
                timeout_secs: 30,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup, falling back to
    /// defaults for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |name: &str, default: String| lookup(name).unwrap_or(default);

        let denoise = DenoiseParams {
            strength: parse_var(&lookup, "OCR_DENOISE_STRENGTH", defaults.ocr.denoise.strength)?,
            template_window: parse_var(&lookup, "OCR_TEMPLATE_WINDOW", defaults.ocr.denoise.template_window)?,
            search_window: parse_var(&lookup, "OCR_SEARCH_WINDOW", defaults.ocr.denoise.search_window)?,
        };
        if !denoise.is_valid() {
            return Err(ConfigError::InvalidValue {
                name: "OCR_DENOISE_*",
                value: format!("{:?}", denoise),
            });
        }

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST", defaults.server.host),
                port: parse_var(&lookup, "SERVER_PORT", defaults.server.port)?,
                cors_origin: var("CORS_ORIGIN", defaults.server.cors_origin),
                max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
            },
            ocr: OcrConfig {
                engine_path: var("TESSERACT_CMD", defaults.ocr.engine_path),
                data_directory: lookup("TESSERACT_TESSDATA_PREFIX")
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
                language_hint: var("OCR_LANGUAGE", defaults.ocr.language_hint),
                denoise,
            },
            backend: BackendConfig {
                upload_url: var("BACKEND_URL", defaults.backend.upload_url),
                timeout_secs: parse_var(&lookup, "BACKEND_TIMEOUT_SECS", defaults.backend.timeout_secs)?,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
