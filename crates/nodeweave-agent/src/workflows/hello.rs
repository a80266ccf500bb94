//! Four-step greeting pipeline: Hello, World, Combine, Print.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::info;

use nodeweave_core::error::Result;
use nodeweave_core::traits::LlmClient;
use nodeweave_llm::{CustomLlmClient, MockLlmClient};

use crate::graph::{Edge, ErrorPolicy, Graph, Node, RunOutput, Step, WorkflowState};

pub const HELLO_PROMPT: &str = "Generate a greeting word like 'Hello'";
pub const WORLD_PROMPT: &str = "Generate a noun like 'World'";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelloState {
    pub hello_text: String,
    pub world_text: String,
    pub combined_text: String,
    pub hello_generation_time: f64,
    pub world_generation_time: f64,
    pub combine_generation_time: f64,
    pub print_time: f64,
    pub total_time: f64,
    pub execution_history: Vec<String>,
}

impl HelloState {
    /// Start with the greeting already chosen; `HelloNode` will keep it.
    pub fn with_hello(text: impl Into<String>) -> Self {
        Self {
            hello_text: text.into(),
            ..Self::default()
        }
    }
}

impl WorkflowState for HelloState {
    fn history(&self) -> &[String] {
        &self.execution_history
    }

    fn history_mut(&mut self) -> &mut Vec<String> {
        &mut self.execution_history
    }
}

/// Artificial per-node delays, in node order.
const STAGE_DELAYS_MS: [u64; 4] = [100, 200, 150, 50];

pub struct HelloDependencies {
    pub llm_client: Arc<dyn LlmClient>,
    pub simulate_latency: bool,
}

impl HelloDependencies {
    /// Canned keyword client with simulated latency.
    pub fn new() -> Self {
        Self::with_llm_client(Arc::new(MockLlmClient))
    }

    /// The prefixing stand-in client.
    pub fn custom(prefix: Option<String>) -> Self {
        Self::with_llm_client(Arc::new(CustomLlmClient::new(prefix)))
    }

    pub fn with_llm_client(llm_client: Arc<dyn LlmClient>) -> Self {
        Self {
            llm_client,
            simulate_latency: true,
        }
    }

    pub fn without_latency(mut self) -> Self {
        self.simulate_latency = false;
        self
    }

    async fn pause(&self, stage: usize) {
        if self.simulate_latency {
            tokio::time::sleep(Duration::from_millis(STAGE_DELAYS_MS[stage])).await;
        }
    }
}

impl Default for HelloDependencies {
    fn default() -> Self {
        Self::new()
    }
}

type HelloStep = Step<HelloState, HelloDependencies, String>;

pub struct HelloNode;
pub struct WorldNode;
pub struct CombineNode;
pub struct PrintNode;

impl Node<HelloState, HelloDependencies, String> for HelloNode {
    fn name(&self) -> &'static str {
        "HelloNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::To("WorldNode")]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    fn summary(&self, state: &HelloState) -> String {
        format!("Generated '{}'", state.hello_text)
    }

    fn run<'a>(
        &'a self,
        state: &'a mut HelloState,
        deps: &'a HelloDependencies,
    ) -> BoxFuture<'a, Result<HelloStep>> {
        Box::pin(async move {
            let start = Instant::now();
            if state.hello_text.is_empty() {
                state.hello_text = deps.llm_client.generate_text(HELLO_PROMPT).await?;
            }
            deps.pause(0).await;
            state.hello_generation_time = start.elapsed().as_secs_f64();
            Ok(Step::next(WorldNode))
        })
    }
}

impl Node<HelloState, HelloDependencies, String> for WorldNode {
    fn name(&self) -> &'static str {
        "WorldNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::To("CombineNode")]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    fn summary(&self, state: &HelloState) -> String {
        format!("Generated '{}'", state.world_text)
    }

    fn run<'a>(
        &'a self,
        state: &'a mut HelloState,
        deps: &'a HelloDependencies,
    ) -> BoxFuture<'a, Result<HelloStep>> {
        Box::pin(async move {
            let start = Instant::now();
            if state.world_text.is_empty() {
                state.world_text = deps.llm_client.generate_text(WORLD_PROMPT).await?;
            }
            deps.pause(1).await;
            state.world_generation_time = start.elapsed().as_secs_f64();
            Ok(Step::next(CombineNode))
        })
    }
}

impl Node<HelloState, HelloDependencies, String> for CombineNode {
    fn name(&self) -> &'static str {
        "CombineNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::To("PrintNode")]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    fn summary(&self, state: &HelloState) -> String {
        format!("Combined '{}'", state.combined_text)
    }

    fn run<'a>(
        &'a self,
        state: &'a mut HelloState,
        deps: &'a HelloDependencies,
    ) -> BoxFuture<'a, Result<HelloStep>> {
        Box::pin(async move {
            let start = Instant::now();
            state.combined_text = format!("{} {}!", state.hello_text, state.world_text);
            deps.pause(2).await;
            state.combine_generation_time = start.elapsed().as_secs_f64();
            Ok(Step::next(PrintNode))
        })
    }
}

impl Node<HelloState, HelloDependencies, String> for PrintNode {
    fn name(&self) -> &'static str {
        "PrintNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::End]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    fn summary(&self, state: &HelloState) -> String {
        format!("Printed '{}'", state.combined_text)
    }

    fn run<'a>(
        &'a self,
        state: &'a mut HelloState,
        deps: &'a HelloDependencies,
    ) -> BoxFuture<'a, Result<HelloStep>> {
        Box::pin(async move {
            let start = Instant::now();
            info!(text = %state.combined_text, "Hello workflow output");
            deps.pause(3).await;
            state.print_time = start.elapsed().as_secs_f64();
            state.total_time = state.hello_generation_time
                + state.world_generation_time
                + state.combine_generation_time
                + state.print_time;
            Ok(Step::End(state.combined_text.clone()))
        })
    }
}

pub fn graph() -> Graph<HelloState, HelloDependencies, String> {
    Graph::new("hello")
        .node(HelloNode)
        .node(WorldNode)
        .node(CombineNode)
        .node(PrintNode)
}

/// Run the pipeline from `HelloNode`.
pub async fn run_hello(
    state: &mut HelloState,
    deps: &HelloDependencies,
) -> Result<RunOutput<String>> {
    graph().run(Box::new(HelloNode), state, deps).await
}
