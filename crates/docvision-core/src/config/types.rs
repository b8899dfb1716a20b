//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Remote inference endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Chat-completions URL the requests are POSTed to
    pub url: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Provider label used in logs and error messages
    pub provider: String,

    /// Optional generation cap forwarded to the endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Optional sampling temperature forwarded to the endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: "${DOCVISION_API_KEY}".to_string(),
            model: crate::llm::DEFAULT_MODEL.to_string(),
            provider: "qwen".to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Which bytes are embedded in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmitMode {
    /// The original file bytes, untouched
    #[default]
    Original,
    /// The bounded, resampled image re-encoded as PNG
    Resized,
}

/// Image normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Maximum width in pixels after normalization
    pub max_width: u32,

    /// Maximum height in pixels after normalization
    pub max_height: u32,

    /// Which representation of the image is sent
    pub transmit: TransmitMode,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: 1250,
            max_height: 1750,
            transmit: TransmitMode::Original,
        }
    }
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum concurrent remote calls
    pub parallel: usize,

    /// Per-call deadline in milliseconds
    pub timeout_ms: u64,

    /// Retries for transient failures (0 = a single attempt)
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: 4,
            timeout_ms: 120_000,
            retry_attempts: 0,
            retry_delay_ms: 1000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
