//! DocVision Core - structured extraction from document images.
//!
//! DocVision turns a batch of document images plus a textual instruction into
//! JSON by delegating the reading itself to a remote vision-language model.
//!
//! # Architecture
//!
//! ```text
//! Paths → Normalize → Encode (data URL) → Chat Completions → Extract JSON → Results
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use docvision_core::{InferenceClient, InferenceMode, InferenceRequestItem};
//!
//! #[tokio::main]
//! async fn main() -> docvision_core::Result<()> {
//!     let client = InferenceClient::new("https://openrouter.ai/api/v1/chat/completions", "sk-...");
//!     let items = [InferenceRequestItem::new(["invoice.jpg"], "retrieve the invoice table")];
//!
//!     for result in client.inference(&items, InferenceMode::Live).await? {
//!         println!("{}", result.to_output_string());
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod imaging;
pub mod llm;
pub mod types;

// Re-exports for convenient access
pub use client::{build_worklist, InferenceClient, InferenceOptions};
pub use config::{Config, TransmitMode};
pub use error::{ConfigError, DocVisionError, InferenceError, ItemResult, Result};
pub use extract::{extract_structured, parse_structured};
pub use imaging::{encode_to_data_url, ImageInput, ImageNormalizer, NormalizedImage};
pub use llm::{ChatCompletionsProvider, VisionProvider, VisionRequest};
pub use types::{BatchSummary, InferenceMode, InferenceRequestItem, InferenceResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
