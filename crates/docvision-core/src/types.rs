//! Core data types for the extraction pipeline.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::extract;

/// One entry of an inference batch.
///
/// Only the first item's `text_input` is used as the instruction; all images
/// across all items share it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequestItem {
    /// Image files to read, in order
    #[serde(default, alias = "file_path")]
    pub file_paths: Vec<String>,

    /// Extraction instruction for the model
    pub text_input: String,
}

impl InferenceRequestItem {
    pub fn new<I, S>(file_paths: I, text_input: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_paths: file_paths.into_iter().map(Into::into).collect(),
            text_input: text_input.into(),
        }
    }
}

/// How a batch is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceMode {
    /// Call the remote endpoint for every image
    #[default]
    Live,
    /// Return the canned result without touching the network or disk
    Static,
}

impl FromStr for InferenceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "live" => Ok(Self::Live),
            "static" => Ok(Self::Static),
            other => Err(ConfigError::ValidationError(format!(
                "unknown inference mode: {other}"
            ))),
        }
    }
}

/// Outcome for one worklist entry.
///
/// Serializes as the JSON value itself, as `{"error": message}`, or as the
/// raw model text respectively.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResult {
    /// The model output parsed as JSON
    Success(Value),
    /// Loading, transport or response-shape failure
    Error(String),
    /// The model answered but the text could not be parsed as JSON
    Unparsed(String),
}

impl InferenceResult {
    /// Turn raw model output into a result, falling back to the unparsed text.
    pub fn from_model_output(raw: &str) -> Self {
        match extract::parse_structured(raw) {
            Ok(value) => Self::Success(value),
            Err(e) => {
                tracing::warn!("Failed to parse JSON from model output: {e}");
                Self::Unparsed(raw.to_string())
            }
        }
    }

    /// Canned result returned in static mode.
    pub fn canned() -> Self {
        Self::Success(json!({
            "table": [
                {
                    "description": "Revenues",
                    "latest_amount": 12453,
                    "previous_amount": 11445
                },
                {
                    "description": "Operating expenses",
                    "latest_amount": 9157,
                    "previous_amount": 8724
                }
            ]
        }))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Render for output: 2-space-indented JSON, or the raw text when unparsed.
    pub fn to_output_string(&self) -> String {
        match self {
            Self::Unparsed(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        }
    }
}

impl Serialize for InferenceResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(value) => value.serialize(serializer),
            Self::Error(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
            Self::Unparsed(text) => serializer.serialize_str(text),
        }
    }
}

/// Per-batch outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub unparsed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[InferenceResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match r {
                InferenceResult::Success(_) => acc.succeeded += 1,
                InferenceResult::Unparsed(_) => acc.unparsed += 1,
                InferenceResult::Error(_) => acc.failed += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.unparsed + self.failed
    }
}
