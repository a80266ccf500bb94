use std::path::Path;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{AddResult, Metadata, ProcessedDocument, QueryResult};

/// LLM client: single-shot text generation.
pub trait LlmClient: Send + Sync + 'static {
    /// Generate a completion for `prompt`.
    fn generate_text(&self, prompt: &str) -> BoxFuture<'_, Result<String>>;
}

/// Document store: search backend used for ingestion and retrieval.
pub trait DocumentStore: Send + Sync + 'static {
    /// Add documents to a collection.
    ///
    /// When `ids` or `metadata` are `None` the store fills in its own defaults.
    fn add_documents(
        &self,
        collection: &str,
        documents: Vec<String>,
        ids: Option<Vec<String>>,
        metadata: Option<Vec<Metadata>>,
    ) -> BoxFuture<'_, Result<AddResult>>;

    /// Return up to `n_results` ranked hits for each query text.
    fn query(
        &self,
        collection: &str,
        query_texts: Vec<String>,
        n_results: usize,
    ) -> BoxFuture<'_, Result<QueryResult>>;
}

/// Document processor: extracts text from formats that need more than a plain read.
pub trait DocumentProcessor: Send + Sync + 'static {
    /// Processor name, recorded in document metadata.
    fn name(&self) -> &str;

    /// Whether the processor is usable at all (e.g. optional backends present).
    fn is_available(&self) -> bool {
        true
    }

    /// Extract the text content of a single file.
    fn process<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ProcessedDocument>>;
}
