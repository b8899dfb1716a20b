//! Error types for the DocVision extraction pipeline.
//!
//! Per-item failures ([`InferenceError`]) are caught at the batch boundary and
//! turned into error-tagged results; only configuration and caller contract
//! violations surface as [`DocVisionError`].

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for DocVision operations.
#[derive(Error, Debug)]
pub enum DocVisionError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A per-item failure raised through `?` by a library caller, for example
    /// around [`crate::encode_to_data_url`]. The batch client never returns it.
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures of a single worklist item.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The image is missing, unreadable or not decodable
    #[error("Failed to load image {path}: {message}")]
    ImageLoad { path: PathBuf, message: String },

    /// Non-2xx status or transport-level failure
    #[error("{message}")]
    RemoteRequest {
        message: String,
        status_code: Option<u16>,
    },

    /// The remote call succeeded but the body lacks the expected content
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// The remote call did not finish within the per-call deadline
    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl InferenceError {
    pub(crate) fn image_load(path: &std::path::Path, message: impl ToString) -> Self {
        Self::ImageLoad {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Convenience type alias for DocVision results.
pub type Result<T> = std::result::Result<T, DocVisionError>;

/// Convenience type alias for per-item results.
pub type ItemResult<T> = std::result::Result<T, InferenceError>;
