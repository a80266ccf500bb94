use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nodeweave_core::config::ModelConfig;
use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::LlmClient;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini native API client.
pub struct GeminiClient {
    http: Client,
    config: ModelConfig,
    api_key: String,
}

impl GeminiClient {
    /// Build a client for `config.model_id`. Fails when no API key is configured.
    pub fn new(config: ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| NodeweaveError::Config("Gemini: api_key is required".into()))?;

        debug!(model = %config.model_id, "Initialized Gemini client");
        Ok(Self {
            http: Client::new(),
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(GEMINI_API_URL)
            .trim_end_matches('/');
        format!(
            "{}/models/{}:generateContent?key={}",
            base, self.config.model_id, self.api_key
        )
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

fn build_request(prompt: &str, config: &ModelConfig) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: Some(prompt.to_string()),
            }],
        }],
        generation_config: Some(GenerationConfig {
            max_output_tokens: Some(config.max_tokens),
            temperature: if config.temperature > 0.0 {
                Some(config.temperature)
            } else {
                None
            },
        }),
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GeminiResponse) -> Result<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(NodeweaveError::LlmParse(format!("Gemini returned no candidates: {}", reason)));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(NodeweaveError::LlmParse(format!(
            "Gemini candidate had no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

impl LlmClient for GeminiClient {
    fn generate_text(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let body = build_request(prompt, &self.config);

        Box::pin(async move {
            let response = self
                .http
                .post(self.endpoint())
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| NodeweaveError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                warn!(%status, "Gemini request failed");
                return Err(NodeweaveError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let parsed: GeminiResponse = response
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

    fn keyed_config() -> ModelConfig {
        ModelConfig {
            api_key: Some("test-key".into()),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_request_serialization() {
        let body = build_request("Say hi", &keyed_config());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Say hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_zero_temperature_omitted() {
        let mut config = keyed_config();
        config.temperature = 0.0;
        let json = serde_json::to_value(build_request("x", &config)).unwrap();
        assert!(json["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello"}, {"text": " there"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Hello there");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = extract_text(response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_endpoint_uses_base_url_override() {
        let mut config = keyed_config();
        config.base_url = Some("http://localhost:9000/v1beta/".into());
        let client = GeminiClient::new(config).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-1.5-flash-001:generateContent?key=test-key"
        );
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut config = keyed_config();
        config.api_key = Some(String::new());
        assert!(GeminiClient::new(config).is_err());
    }
}
