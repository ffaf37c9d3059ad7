//! Google Gemini provider implementation.
//!
//! Uses the `generateContent` endpoint of the Generative Language API.
//!
//! Features:
//! - `x-goog-api-key` header authentication (the key never appears in URLs)
//! - System prompt as the top-level `systemInstruction`
//! - `assistant` turns sent with the `model` role
//! - Inline images as `inlineData` parts
//! - Safety blocks detected from `finishReason` / `promptFeedback`

use async_trait::async_trait;
use medbridge_core::error::ProviderError;
use medbridge_core::message::{Content, ContentPart, Message, Role};
use medbridge_core::provider::{CompletionRequest, Provider};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Finish/block reasons that mean the provider refused to produce content.
const SAFETY_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// Fails with [`ProviderError::NotConfigured`] when the key is blank, so
    /// a missing credential is caught at startup instead of per call.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "GEMINI_API_KEY is not configured".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Join all system messages into the top-level instruction.
    fn extract_system(messages: &[Message]) -> Option<String> {
        let system_parts: Vec<String> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.text())
            .filter(|t| !t.is_empty())
            .collect();

        if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        }
    }

    /// Convert the non-system transcript into Gemini `contents`.
    fn to_api_contents(messages: &[Message]) -> Vec<GeminiContent> {
        messages
            .iter()
            .filter_map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    Role::System => return None,
                };
                let parts = Self::to_api_parts(&msg.content);
                if parts.is_empty() {
                    return None;
                }
                Some(GeminiContent {
                    role: Some(role.into()),
                    parts,
                })
            })
            .collect()
    }

    fn to_api_parts(content: &Content) -> Vec<GeminiPart> {
        match content {
            Content::Text(text) if text.is_empty() => Vec::new(),
            Content::Text(text) => vec![GeminiPart::text(text.clone())],
            Content::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => GeminiPart::text(text.clone()),
                    ContentPart::Image(image) => GeminiPart {
                        inline_data: Some(InlineData {
                            mime_type: image.mime_type.clone(),
                            data: image.data.clone(),
                        }),
                        ..GeminiPart::default()
                    },
                    ContentPart::ImageUrl { url } => GeminiPart::text(legacy_image_instruction(url)),
                })
                .collect(),
        }
    }

    fn build_body(request: &CompletionRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: Self::to_api_contents(&request.messages),
            system_instruction: Self::extract_system(&request.messages).map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(text)],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }

    /// Pull the text payload out of a successful response.
    fn response_text(resp: GenerateContentResponse) -> Result<String, ProviderError> {
        let candidate = resp.candidates.into_iter().next();

        let text = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if !text.trim().is_empty() {
            return Ok(text);
        }

        let finish_reason = candidate.and_then(|c| c.finish_reason);
        let block_reason = resp.prompt_feedback.and_then(|f| f.block_reason);
        if let Some(reason) = finish_reason
            .into_iter()
            .chain(block_reason)
            .find(|r| SAFETY_REASONS.contains(&r.as_str()))
        {
            return Err(ProviderError::SafetyBlocked { reason });
        }

        Err(ProviderError::EmptyResponse)
    }
}

/// Text sent in place of an image that is only available by URL.
fn legacy_image_instruction(url: &str) -> String {
    format!(
        "Изображение доступно по URL: {url}. Опиши видимые признаки объективно, не ставя точного диагноза."
    )
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(request);

        debug!(provider = "gemini", model = %request.model, contents = body.contents.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Gemini API error");
            let message = serde_json::from_str::<ErrorEnvelope>(&error_body)
                .map(|env| env.error.message)
                .unwrap_or(error_body);
            return Err(if status.is_server_error() {
                ProviderError::Server {
                    status_code: status.as_u16(),
                    message,
                }
            } else {
                ProviderError::Client {
                    status_code: status.as_u16(),
                    message,
                }
            });
        }

        let api_resp: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to decode Gemini response: {e}")))?;

        Self::response_text(api_resp)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
