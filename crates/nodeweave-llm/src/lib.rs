pub mod providers;
pub mod retry;

use nodeweave_core::config::ModelConfig;
use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::LlmClient;

pub use providers::gemini::GeminiClient;
pub use providers::mock::{CustomLlmClient, MockLlmClient};
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Box::new(GeminiClient::new(config.clone())?)),
        "mock" => Ok(Box::new(MockLlmClient)),
        "openai" | "ollama" | "openai-compatible" => Ok(Box::new(OpenAiClient::new(config.clone()))),
        other => Err(NodeweaveError::UnsupportedProvider(other.to_string())),
    }
}

/// Create a client for the primary model, wrapped with retries and fallbacks
/// when the config asks for them.
pub fn create_client_with_fallbacks(
    primary: &ModelConfig,
    fallbacks: &[ModelConfig],
) -> Result<Box<dyn LlmClient>> {
    let client = create_client(primary)?;
    if primary.retry.is_none() && fallbacks.is_empty() {
        return Ok(client);
    }

    let fallback_clients = fallbacks
        .iter()
        .map(create_client)
        .collect::<Result<Vec<_>>>()?;

    Ok(Box::new(RetryingClient::new(
        client,
        fallback_clients,
        primary.retry.clone().unwrap_or_default(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_client() {
        let config = ModelConfig {
            provider: "mock".into(),
            ..ModelConfig::default()
        };
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let config = ModelConfig::default();
        let err = create_client(&config).err().unwrap();
        assert!(matches!(err, NodeweaveError::Config(_)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = ModelConfig {
            provider: "carrier-pigeon".into(),
            ..ModelConfig::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(matches!(err, NodeweaveError::UnsupportedProvider(p) if p == "carrier-pigeon"));
    }

    #[test]
    fn test_fallbacks_wrap_primary() {
        let mock = ModelConfig {
            provider: "mock".into(),
            ..ModelConfig::default()
        };
        assert!(create_client_with_fallbacks(&mock, &[mock.clone()]).is_ok());
    }
}
