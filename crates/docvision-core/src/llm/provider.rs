//! Vision provider trait and the provider-neutral request type.

use crate::error::InferenceError;
use crate::imaging::ImageInput;
use async_trait::async_trait;
use std::time::Duration;

/// A request to extract structured data from one image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// The image to read
    pub image: ImageInput,
    /// Caller instruction describing what to extract
    pub instruction: String,
}

/// Trait that all remote vision backends implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the client holds an `Arc<dyn VisionProvider>`).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider name for logs and error messages (e.g., "qwen").
    fn name(&self) -> &str;

    /// Send the request and return the raw generated text.
    async fn generate(&self, request: &VisionRequest) -> Result<String, InferenceError>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
