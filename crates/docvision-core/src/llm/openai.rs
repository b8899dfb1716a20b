//! OpenAI-compatible Chat Completions provider.
//!
//! Sends the image via data URL in the user message content array and reads
//! the answer from `choices[0].message.content`.

use super::chat::ChatRequest;
use super::provider::{VisionProvider, VisionRequest};
use crate::config::EndpointConfig;
use crate::error::InferenceError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Provider for any endpoint speaking the Chat Completions protocol.
pub struct ChatCompletionsProvider {
    label: String,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout: Duration,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            label: "qwen".to_string(),
            api_key: api_key.to_string(),
            model: super::DEFAULT_MODEL.to_string(),
            endpoint: endpoint.to_string(),
            max_tokens: None,
            temperature: None,
            timeout: Duration::from_secs(120),
            client: reqwest::Client::new(),
        }
    }

    /// Create from the `[endpoint]` config section.
    ///
    /// An unresolved API key is not an error here; the endpoint reports it.
    pub fn from_config(config: &EndpointConfig, timeout: Duration) -> Self {
        let api_key = super::resolve_env_var(&config.api_key).unwrap_or_else(|| {
            tracing::warn!("API key for {} is not set; requests will be sent without one", config.provider);
            String::new()
        });
        Self {
            label: config.provider.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
            ..Self::new(&config.url, &api_key)
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl VisionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: &VisionRequest) -> Result<String, InferenceError> {
        let start = Instant::now();
        let body = ChatRequest::extraction(&self.model, request)
            .with_sampling(self.max_tokens, self.temperature);

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else if e.is_connect() {
                    InferenceError::RemoteRequest {
                        message: format!("connection failed: {e}"),
                        status_code: None,
                    }
                } else {
                    InferenceError::RemoteRequest {
                        message: format!("request failed: {e}"),
                        status_code: None,
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(InferenceError::RemoteRequest {
                message: format!("HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::ResponseShape(format!("undecodable body: {e}")))?;

        let text = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                InferenceError::ResponseShape("missing choices[0].message.content".to_string())
            })?;

        tracing::debug!(
            "{} answered in {}ms ({} chars)",
            self.label,
            start.elapsed().as_millis(),
            text.len()
        );
        Ok(text)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
