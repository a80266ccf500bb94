use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use nodeweave_core::config::ModelConfig;
use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::LlmClient;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
    config: ModelConfig,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct OaiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<OaiChoice>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiResponseMessage,
}

#[derive(Deserialize)]
struct OaiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| NodeweaveError::LlmParse("response contained no message content".into()))
}

impl LlmClient for OpenAiClient {
    fn generate_text(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let prompt = prompt.to_string();

        Box::pin(async move {
            let url = self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL);

            let body = ChatRequest {
                model: &self.config.model_id,
                messages: vec![OaiMessage {
                    role: "user",
                    content: &prompt,
                }],
                max_tokens: self.config.max_tokens,
                temperature: if self.config.temperature > 0.0 {
                    Some(self.config.temperature)
                } else {
                    None
                },
                stream: false,
            };

            let mut req = self.http.post(url).json(&body);
            if let Some(api_key) = &self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = req
                .send()
                .await
                .map_err(|e| NodeweaveError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                warn!(%status, model = %self.config.model_id, "Chat completion failed");
                return Err(NodeweaveError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| NodeweaveError::LlmParse(e.to_string()))?;

            extract_text(parsed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_choice() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "World"}}]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "World");
    }

    #[test]
    fn test_extract_empty_choices() {
        let response: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(NodeweaveError::LlmParse(_))
        ));
    }

    #[test]
    fn test_request_is_not_streaming() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![OaiMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 16,
            temperature: None,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["content"], "hi");
    }
}
