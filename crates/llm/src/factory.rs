//! LLM provider factory.
//!
//! Resolves a provider name from configuration into a concrete client.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use crate::types::{ClientOptions, ProviderType};
use docent_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, and propagates
/// HTTP client construction failures.
pub fn create_client(provider: &str, options: ClientOptions) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    tracing::debug!(
        provider = provider_type.as_str(),
        endpoint = %options.endpoint,
        timeout_ms = options.timeout.as_millis() as u64,
        "Creating LLM client"
    );

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_options(options)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", ClientOptions::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let options = ClientOptions::default().with_endpoint("http://localhost:8080");
        assert!(create_client("ollama", options).is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", ClientOptions::default()) {
            Err(AppError::Config(msg)) => assert!(msg.contains("Unknown provider")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
