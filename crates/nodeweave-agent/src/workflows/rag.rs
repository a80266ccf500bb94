//! Retrieval-augmented answering: Query, Retrieve, Answer.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nodeweave_core::config::AppConfig;
use nodeweave_core::error::Result;
use nodeweave_core::traits::{DocumentStore, LlmClient};
use nodeweave_core::types::{Metadata, QueryResult};
use nodeweave_memory::SqliteDocumentStore;

use crate::graph::{Edge, ErrorPolicy, Graph, Node, RunOutput, Step, WorkflowState};

pub const ANSWER_ERROR_MESSAGE: &str =
    "I'm sorry, I encountered an error while generating a response. Please try again later.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagState {
    pub query: String,
    pub retrieved_documents: Vec<RetrievedDocument>,
    pub sources: Vec<String>,
    pub answer: String,
    pub retrieval_time: f64,
    pub generation_time: f64,
    pub total_time: f64,
    pub node_execution_history: Vec<String>,
    #[serde(skip)]
    started: Option<Instant>,
}

impl RagState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

impl WorkflowState for RagState {
    fn history(&self) -> &[String] {
        &self.node_execution_history
    }

    fn history_mut(&mut self) -> &mut Vec<String> {
        &mut self.node_execution_history
    }
}

pub struct RagDependencies {
    pub llm_client: Arc<dyn LlmClient>,
    pub store: Arc<dyn DocumentStore>,
    pub collection: String,
    pub n_results: usize,
}

impl RagDependencies {
    pub fn new(llm_client: Arc<dyn LlmClient>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            llm_client,
            store,
            collection: "default_collection".to_string(),
            n_results: 5,
        }
    }

    /// Model client, store and retrieval settings from the config file.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client =
            nodeweave_llm::create_client_with_fallbacks(&config.model, &config.fallback_models)?;
        let store = SqliteDocumentStore::open(&config.store_path())?;
        Ok(Self::new(Arc::from(client), Arc::new(store))
            .with_collection(&config.store.default_collection)
            .with_n_results(config.rag.n_results))
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_n_results(mut self, n_results: usize) -> Self {
        self.n_results = n_results;
        self
    }
}

type RagStep = Step<RagState, RagDependencies, String>;

pub struct QueryNode;
pub struct RetrieveNode;
pub struct AnswerNode;

impl Node<RagState, RagDependencies, String> for QueryNode {
    fn name(&self) -> &'static str {
        "QueryNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::To("RetrieveNode")]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    fn summary(&self, state: &RagState) -> String {
        format!("Processing query: {}", state.query)
    }

    fn run<'a>(
        &'a self,
        state: &'a mut RagState,
        _deps: &'a RagDependencies,
    ) -> BoxFuture<'a, Result<RagStep>> {
        Box::pin(async move {
            info!(query = %state.query, "Processing query");
            state.started = Some(Instant::now());
            Ok(Step::next(RetrieveNode))
        })
    }
}

impl Node<RagState, RagDependencies, String> for RetrieveNode {
    fn name(&self) -> &'static str {
        "RetrieveNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::To("AnswerNode")]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::ContinueWithMessage
    }

    fn summary(&self, state: &RagState) -> String {
        format!("Retrieved {} documents", state.retrieved_documents.len())
    }

    fn run<'a>(
        &'a self,
        state: &'a mut RagState,
        deps: &'a RagDependencies,
    ) -> BoxFuture<'a, Result<RagStep>> {
        Box::pin(async move {
            let start = Instant::now();
            let queried = deps
                .store
                .query(&deps.collection, vec![state.query.clone()], deps.n_results)
                .await;
            let results = self
                .error_policy()
                .recover(self.name(), queried, |_| QueryResult::default())?;

            let hits = results.hits(0);
            if hits.is_empty() {
                warn!(collection = %deps.collection, "No documents returned from query");
            }
            state.sources = hits.iter().map(|(_, meta)| source_of(meta)).collect();
            state.retrieved_documents = hits
                .into_iter()
                .map(|(content, metadata)| RetrievedDocument { content, metadata })
                .collect();

            state.retrieval_time = start.elapsed().as_secs_f64();
            Ok(Step::next(AnswerNode))
        })
    }
}

impl Node<RagState, RagDependencies, String> for AnswerNode {
    fn name(&self) -> &'static str {
        "AnswerNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::End]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::ContinueWithMessage
    }

    fn summary(&self, state: &RagState) -> String {
        format!("Generated answer with {} characters", state.answer.chars().count())
    }

    fn run<'a>(
        &'a self,
        state: &'a mut RagState,
        deps: &'a RagDependencies,
    ) -> BoxFuture<'a, Result<RagStep>> {
        Box::pin(async move {
            let start = Instant::now();
            let prompt = build_prompt(state);
            let generated = deps.llm_client.generate_text(&prompt).await;
            state.answer = self
                .error_policy()
                .recover(self.name(), generated, |_| ANSWER_ERROR_MESSAGE.to_string())?;

            state.generation_time = start.elapsed().as_secs_f64();
            state.total_time = match state.started {
                Some(started) => started.elapsed().as_secs_f64(),
                None => state.retrieval_time + state.generation_time,
            };

            let output = if state.sources.is_empty() {
                state.answer.clone()
            } else {
                format!("{}\n\nSources: {}", state.answer, state.sources.join(", "))
            };
            Ok(Step::End(output))
        })
    }
}

/// `source`, else `filename`, else `unknown`.
fn source_of(meta: &Metadata) -> String {
    meta.get("source")
        .or_else(|| meta.get("filename"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

fn build_prompt(state: &RagState) -> String {
    let context = if state.retrieved_documents.is_empty() {
        "No relevant documents found.".to_string()
    } else {
        state
            .retrieved_documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let source = state.sources.get(i).map(String::as_str).unwrap_or("unknown");
                format!("Document {} (from {}):\n{}", i + 1, source, doc.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "Based on the following information, please answer the question.\n\n\
         CONTEXT:\n{}\n\n\
         QUESTION:\n{}\n\n\
         Answer the question based only on the provided context. If the context doesn't contain \
         the information needed to answer the question, say \"I don't have enough information to \
         answer this question.\"\n\n\
         Include citations to the relevant documents where appropriate.",
        context, state.query
    )
}

pub fn graph() -> Graph<RagState, RagDependencies, String> {
    Graph::new("rag")
        .node(QueryNode)
        .node(RetrieveNode)
        .node(AnswerNode)
}

/// Run the pipeline from `QueryNode`.
pub async fn run_rag(state: &mut RagState, deps: &RagDependencies) -> Result<RunOutput<String>> {
    graph().run(Box::new(QueryNode), state, deps).await
}

/// Flattened outcome of `run_rag_query`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<String>,
    pub retrieval_time: f64,
    pub generation_time: f64,
    pub total_time: f64,
}

/// Answer `query` in one call. A failed run comes back as `"Error: <message>"`.
pub async fn run_rag_query(query: &str, deps: &RagDependencies) -> RagAnswer {
    let mut state = RagState::new(query);
    let answer = match run_rag(&mut state, deps).await {
        Ok(run) => run.output,
        Err(e) => {
            warn!(error = %e, "RAG run failed");
            format!("Error: {}", e)
        }
    };
    RagAnswer {
        answer,
        sources: state.sources,
        retrieval_time: state.retrieval_time,
        generation_time: state.generation_time,
        total_time: state.total_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeweave_core::types::metadata_from;
    use nodeweave_test_utils::{FailingLlm, RecordingLlm, RecordingStore};

    fn store_with_hits() -> RecordingStore {
        RecordingStore::new().with_hits(vec![
            ("Tokio is an async runtime.", metadata_from([("source", "tokio.md")])),
            ("Serde serializes data.", metadata_from([("filename", "serde.txt")])),
            ("Orphan chunk.", Metadata::new()),
        ])
    }

    #[tokio::test]
    async fn test_answer_lists_sources() {
        let llm = Arc::new(RecordingLlm::new("Tokio runs async tasks."));
        let store = Arc::new(store_with_hits());
        let deps = RagDependencies::new(llm.clone(), store.clone()).with_n_results(3);

        let mut state = RagState::new("What is tokio?");
        let run = run_rag(&mut state, &deps).await.unwrap();

        assert_eq!(
            run.output,
            "Tokio runs async tasks.\n\nSources: tokio.md, serde.txt, unknown"
        );
        assert_eq!(state.node_execution_history.len(), 3);
        assert_eq!(run.trace.len(), 4);

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Document 1 (from tokio.md):\nTokio is an async runtime."));
        assert!(prompt.contains("QUESTION:\nWhat is tokio?"));
        assert_eq!(
            store.queries()[0],
            ("default_collection".to_string(), vec!["What is tokio?".to_string()], 3)
        );
    }

    #[tokio::test]
    async fn test_retrieval_failure_continues_without_context() {
        let llm = Arc::new(RecordingLlm::new("Not enough information."));
        let store = Arc::new(RecordingStore::new().failing_query("offline"));
        let deps = RagDependencies::new(llm.clone(), store);

        let mut state = RagState::new("anything");
        let run = run_rag(&mut state, &deps).await.unwrap();

        assert_eq!(run.output, "Not enough information.");
        assert!(state.retrieved_documents.is_empty());
        assert!(llm.prompts()[0].contains("No relevant documents found."));
    }

    #[tokio::test]
    async fn test_generation_failure_apologises() {
        let deps = RagDependencies::new(
            Arc::new(FailingLlm::new("503")),
            Arc::new(store_with_hits()),
        );

        let answer = run_rag_query("What is serde?", &deps).await;

        assert!(answer.answer.starts_with(ANSWER_ERROR_MESSAGE));
        assert!(answer.answer.ends_with("Sources: tokio.md, serde.txt, unknown"));
        assert!(answer.total_time >= answer.generation_time);
    }

    #[test]
    fn test_graph_is_closed() {
        assert!(graph().validate().is_ok());
    }
}
