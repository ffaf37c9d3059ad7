//! Provider trait: the abstraction over the remote completion service.
//!
//! A Provider performs exactly one completion attempt and classifies its own
//! failures. Timeouts, retries and backoff live one layer up, in the LLM
//! gateway, so every provider gets the same policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Everything one completion attempt needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "gemini-1.5-flash")
    pub model: String,

    /// The full transcript, including its leading system message
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// The core Provider trait.
///
/// Implementations translate the transcript into their wire format, send a
/// single request and return the text payload.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send one request and return the extracted text.
    async fn send(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
