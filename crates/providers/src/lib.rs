//! LLM provider implementations and the retrying completion gateway.
//!
//! Providers implement the `medbridge_core::Provider` trait and make a
//! single attempt. [`LlmGateway`] wraps one with timeout, retry and backoff.

pub mod gateway;
pub mod gemini;

use std::sync::Arc;

use medbridge_config::AppConfig;
use medbridge_core::error::ProviderError;
use medbridge_core::provider::Provider;

pub use gateway::{LlmGateway, RetryPolicy};
pub use gemini::GeminiProvider;

/// Build the configured provider.
///
/// A missing API key or an unknown provider name is a configuration error,
/// reported here so the process can refuse to start.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    match config.llm.provider.as_str() {
        "gemini" => {
            let api_key = config.llm.api_key.clone().unwrap_or_default();
            let provider = GeminiProvider::new(api_key)?.with_base_url(&config.llm.base_url);
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::NotConfigured(format!(
            "Unknown LLM provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_gemini_with_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("key".into());
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn missing_key_fails_at_construction() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        config.llm.provider = "openai".into();
        config.llm.api_key = Some("key".into());
        let err = build_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("openai"));
    }
}
