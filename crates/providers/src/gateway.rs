//! LLM gateway: one logical completion with timeout, retry and backoff.
//!
//! Each attempt is bounded by `tokio::time::timeout`. Attempt `n > 1` first
//! waits `base_delay * n`. Whether another attempt is made depends only on
//! [`ProviderErrorKind::is_retryable`]; non-retryable failures (4xx, safety
//! blocks, missing configuration) are returned immediately. When the budget
//! is spent the last observed error is returned.

use std::sync::Arc;
use std::time::Duration;

use medbridge_config::{AppConfig, RetryConfig};
use medbridge_core::error::ProviderError;
use medbridge_core::message::Message;
use medbridge_core::provider::{CompletionRequest, Provider};
use tracing::{info, warn};

/// Attempt budget and timing for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay before the given 1-based attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.base_delay.saturating_mul(attempt)
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            timeout: config.timeout(),
        }
    }
}

/// Sends transcripts to a [`Provider`] under a [`RetryPolicy`].
///
/// Stateless between calls: nothing about a transcript is kept after
/// `complete` returns.
pub struct LlmGateway {
    provider: Arc<dyn Provider>,
    policy: RetryPolicy,
    model: String,
    temperature: f32,
    max_output_tokens: Option<u32>,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            model: model.into(),
            temperature: 0.2,
            max_output_tokens: None,
        }
    }

    /// Build a gateway with the model, sampling and retry settings of `config`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, &config.llm.model)
            .with_policy(RetryPolicy::from(&config.retry))
            .with_temperature(config.llm.temperature)
            .with_max_output_tokens(config.llm.max_output_tokens)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Complete the transcript, returning the model's text reply.
    pub async fn complete(&self, transcript: &[Message]) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: transcript.to_vec(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };

        let provider_name = self.provider.name();
        let total = self.policy.attempts();
        let timeout_ms = u64::try_from(self.policy.timeout.as_millis()).unwrap_or(u64::MAX);
        let mut last_error = ProviderError::EmptyResponse;

        for attempt in 1..=total {
            if attempt > 1 {
                let delay = self.policy.delay_before(attempt);
                info!(
                    provider = %provider_name,
                    attempt,
                    total,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying completion after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            info!(provider = %provider_name, model = %self.model, attempt, total, "Sending completion");

            let outcome = match tokio::time::timeout(self.policy.timeout, self.provider.send(&request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout { timeout_ms }),
            };

            match outcome {
                Ok(text) => {
                    info!(provider = %provider_name, attempt, "Completion received");
                    return Ok(text);
                }
                Err(e) if !e.kind().is_retryable() => {
                    warn!(provider = %provider_name, attempt, error = %e, "Completion failed, not retryable");
                    return Err(e);
                }
                Err(e) => {
                    warn!(provider = %provider_name, attempt, total, error = %e, "Completion attempt failed");
                    last_error = e;
                }
            }
        }

        warn!(provider = %provider_name, attempts = total, error = %last_error, "All completion attempts exhausted");
        Err(last_error)
    }
}
