use futures::future::BoxFuture;

use nodeweave_core::error::Result;
use nodeweave_core::traits::LlmClient;

/// Keyword-driven client that never leaves the process.
///
/// `hello` in the prompt yields `Hello`, `world` yields `World`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockLlmClient;

impl LlmClient for MockLlmClient {
    fn generate_text(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let reply = keyword_reply(prompt).unwrap_or("I'm a mock LLM client!");
        Box::pin(async move { Ok(reply.to_string()) })
    }
}

/// Stand-in for a real provider: same keyword mapping, plus an optional prefix.
#[derive(Debug, Clone, Default)]
pub struct CustomLlmClient {
    prefix: Option<String>,
}

impl CustomLlmClient {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }
}

impl LlmClient for CustomLlmClient {
    fn generate_text(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let base = keyword_reply(prompt).unwrap_or("Response");
        let reply = match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{} {}", prefix, base),
            _ => base.to_string(),
        };
        Box::pin(async move { Ok(reply) })
    }
}

fn keyword_reply(prompt: &str) -> Option<&'static str> {
    let lower = prompt.to_lowercase();
    if lower.contains("hello") {
        Some("Hello")
    } else if lower.contains("world") {
        Some("World")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_keywords() {
        let client = MockLlmClient;
        assert_eq!(
            client.generate_text("Generate a greeting word like 'Hello'").await.unwrap(),
            "Hello"
        );
        assert_eq!(
            client.generate_text("Generate a noun like 'World'").await.unwrap(),
            "World"
        );
        assert_eq!(
            client.generate_text("anything else").await.unwrap(),
            "I'm a mock LLM client!"
        );
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let client = CustomLlmClient::new(Some("Dear".into()));
        assert_eq!(client.generate_text("say hello").await.unwrap(), "Dear Hello");
        assert_eq!(client.generate_text("other").await.unwrap(), "Dear Response");
    }

    #[tokio::test]
    async fn test_custom_without_prefix() {
        let client = CustomLlmClient::default();
        assert_eq!(client.generate_text("WORLD").await.unwrap(), "World");
    }
}
