use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use nodeweave_core::config::RetryConfig;
use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::LlmClient;

/// Retries transient failures of the primary client, then walks the fallbacks in order.
pub struct RetryingClient {
    primary: Box<dyn LlmClient>,
    fallbacks: Vec<Box<dyn LlmClient>>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Box<dyn LlmClient>,
        fallbacks: Vec<Box<dyn LlmClient>>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry_config,
        }
    }
}

fn is_retryable(e: &NodeweaveError) -> bool {
    match e {
        NodeweaveError::LlmRequest(msg) => {
            let msg = msg.to_lowercase();
            ["429", "500", "502", "503", "timeout", "connection"]
                .iter()
                .any(|needle| msg.contains(needle))
        }
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn generate_text(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let prompt = prompt.to_string();

        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;

            let mut last_err = None;
            for attempt in 0..=max_retries {
                match self.primary.generate_text(&prompt).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if is_retryable(&e) && attempt < max_retries {
                            let backoff = calculate_backoff(attempt, &self.retry_config);
                            warn!(
                                attempt = attempt + 1,
                                max_retries,
                                backoff_ms = backoff.as_millis() as u64,
                                error = %e,
                                "Retrying LLM request"
                            );
                            tokio::time::sleep(backoff).await;
                            last_err = Some(e);
                            continue;
                        }
                        last_err = Some(e);
                        break;
                    }
                }
            }

            if !self.fallbacks.is_empty() {
                info!("Primary LLM exhausted, trying fallback models");
            }
            for (index, fallback) in self.fallbacks.iter().enumerate() {
                match fallback.generate_text(&prompt).await {
                    Ok(text) => {
                        info!(fallback = index, "Fell back to alternative model");
                        return Ok(text);
                    }
                    Err(e) => {
                        warn!(fallback = index, error = %e, "Fallback model also failed");
                    }
                }
            }

            Err(last_err
                .unwrap_or_else(|| NodeweaveError::LlmRequest("All providers failed".into())))
        })
    }
}
