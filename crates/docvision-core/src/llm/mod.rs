//! Remote vision-model integration.
//!
//! Provides the provider seam, the Chat Completions wire format and an
//! OpenAI-compatible HTTP provider, plus retry classification.

pub(crate) mod chat;
pub(crate) mod openai;
pub(crate) mod provider;
pub(crate) mod retry;

pub use chat::{ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent, Role, SYSTEM_INSTRUCTION};
pub use openai::ChatCompletionsProvider;
pub use provider::{resolve_env_var, VisionProvider, VisionRequest};

/// Model identifier used when none is configured.
pub const DEFAULT_MODEL: &str = "qwen/qwen2.5-vl-72b-instruct:free";
