//! Single-node chat: one prompt in, one generated reply out.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use nodeweave_core::config::{AppConfig, ModelConfig};
use nodeweave_core::error::Result;
use nodeweave_core::traits::LlmClient;

use crate::graph::{Edge, ErrorPolicy, Graph, Node, RunOutput, Step, WorkflowState};

pub const NO_PROMPT_MESSAGE: &str = "No prompt provided. Please enter a question or prompt.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    pub user_prompt: String,
    pub ai_response: String,
    pub ai_generation_time: f64,
    pub total_time: f64,
    pub node_execution_history: Vec<String>,
}

impl ChatState {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: prompt.into(),
            ..Self::default()
        }
    }
}

impl WorkflowState for ChatState {
    fn history(&self) -> &[String] {
        &self.node_execution_history
    }

    fn history_mut(&mut self) -> &mut Vec<String> {
        &mut self.node_execution_history
    }
}

pub struct ChatDependencies {
    pub llm_client: Arc<dyn LlmClient>,
}

impl ChatDependencies {
    pub fn new(llm_client: Arc<dyn LlmClient>) -> Self {
        Self { llm_client }
    }

    /// Build the client named by `[model]`, with retries and fallbacks when configured.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::from_model(&config.model, &config.fallback_models)
    }

    pub fn from_model(model: &ModelConfig, fallbacks: &[ModelConfig]) -> Result<Self> {
        let client = nodeweave_llm::create_client_with_fallbacks(model, fallbacks)?;
        Ok(Self::new(Arc::from(client)))
    }
}

pub struct ChatNode;

impl Node<ChatState, ChatDependencies, String> for ChatNode {
    fn name(&self) -> &'static str {
        "ChatNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::End]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::ContinueWithMessage
    }

    fn summary(&self, state: &ChatState) -> String {
        let preview: String = state.ai_response.chars().take(50).collect();
        if preview.len() < state.ai_response.len() {
            format!("Generated response: {}...", preview)
        } else {
            format!("Generated response: {}", preview)
        }
    }

    fn run<'a>(
        &'a self,
        state: &'a mut ChatState,
        deps: &'a ChatDependencies,
    ) -> BoxFuture<'a, Result<Step<ChatState, ChatDependencies, String>>> {
        Box::pin(async move {
            let start = Instant::now();

            if state.user_prompt.trim().is_empty() {
                state.ai_response = NO_PROMPT_MESSAGE.to_string();
            } else {
                let generated = deps.llm_client.generate_text(&state.user_prompt).await;
                state.ai_response = self.error_policy().recover(self.name(), generated, |e| {
                    format!("Error generating response: {}", e)
                })?;
            }

            state.ai_generation_time = start.elapsed().as_secs_f64();
            state.total_time = state.ai_generation_time;
            Ok(Step::End(state.ai_response.clone()))
        })
    }
}

pub fn graph() -> Graph<ChatState, ChatDependencies, String> {
    Graph::new("chat").node(ChatNode)
}

/// Run one chat turn from `ChatNode`.
pub async fn run_chat(
    state: &mut ChatState,
    deps: &ChatDependencies,
) -> Result<RunOutput<String>> {
    graph().run(Box::new(ChatNode), state, deps).await
}
