use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;

use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::LlmClient;

/// Always fails with `LlmRequest(message)` and counts how often it was asked.
pub struct FailingLlm {
    message: String,
    calls: AtomicUsize,
}

impl FailingLlm {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for FailingLlm {
    fn generate_text(&self, _prompt: &str) -> BoxFuture<'_, Result<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let message = self.message.clone();
        Box::pin(async move { Err(NodeweaveError::LlmRequest(message)) })
    }
}

/// Returns a fixed reply and keeps every prompt it was given.
pub struct RecordingLlm {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmClient for RecordingLlm {
    fn generate_text(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let reply = self.reply.clone();
        Box::pin(async move { Ok(reply) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_llm_keeps_prompts() {
        let llm = RecordingLlm::new("ok");
        assert_eq!(llm.generate_text("first").await.unwrap(), "ok");
        llm.generate_text("second").await.unwrap();
        assert_eq!(llm.prompts(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failing_llm_counts_calls() {
        let llm = FailingLlm::new("nope");
        assert!(llm.generate_text("x").await.is_err());
        assert_eq!(llm.calls(), 1);
    }
}
