//! Document ingestion: route files by type, extract what needs extracting,
//! then write everything to the document store in one batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use nodeweave_core::config::AppConfig;
use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::{DocumentProcessor, DocumentStore};
use nodeweave_core::types::{AddResult, LoadedDocument, Metadata};
use nodeweave_memory::{ContentExtractor, SqliteDocumentStore};

use crate::graph::{Edge, ErrorPolicy, Graph, Node, RunOutput, Step, WorkflowState};

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents provided for ingestion";

const HEAVY_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "pptx", "html", "htm", "png", "jpg", "jpeg", "xlsx", "csv", "md", "xml", "json",
];
const TEXT_EXTENSIONS: &[&str] = &["txt"];
const SKIP_EXTENSIONS: &[&str] = &["exe", "dll", "zip", "rar", "7z", "tar", "gz", "bin"];

/// Bytes inspected when deciding whether an unknown file is binary.
const SNIFF_LEN: usize = 1024;

/// Routing bucket for one input path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Needs the document processor.
    Heavy,
    /// Plain text, read directly by the router.
    Text,
    /// Dropped without reading.
    Skip,
    /// Anything else: read directly unless it looks binary.
    Unknown,
}

/// Classify a path by its (case-insensitive) extension.
pub fn classify(path: &Path) -> FileKind {
    let ext = extension(path);
    let ext = ext.as_str();
    if HEAVY_EXTENSIONS.contains(&ext) {
        FileKind::Heavy
    } else if TEXT_EXTENSIONS.contains(&ext) {
        FileKind::Text
    } else if SKIP_EXTENSIONS.contains(&ext) {
        FileKind::Skip
    } else {
        FileKind::Unknown
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Where every router input ended up. Each input lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingReport {
    pub heavy: Vec<PathBuf>,
    pub direct: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub unreadable: Vec<PathBuf>,
}

impl RoutingReport {
    pub fn total(&self) -> usize {
        self.heavy.len() + self.direct.len() + self.skipped.len() + self.unreadable.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestState {
    /// Router input; after routing, only the files left for the processor.
    pub file_paths: Vec<PathBuf>,
    pub documents: Vec<String>,
    pub metadata: Vec<Metadata>,
    pub document_ids: Vec<String>,
    /// Empty means the dependencies' default collection.
    pub collection_name: String,
    pub routing: RoutingReport,
    /// Heavy files the processor could not handle.
    pub failed_files: Vec<PathBuf>,
    pub ingestion_results: Option<AddResult>,
    pub routing_time: f64,
    pub processing_time: f64,
    pub ingestion_time: f64,
    pub total_time: f64,
    pub node_execution_history: Vec<String>,
}

impl IngestState {
    /// State for a router run over `paths`; directories are expanded one level.
    pub fn from_paths(paths: &[PathBuf], collection: impl Into<String>) -> Self {
        let mut file_paths = Vec::new();
        for path in paths {
            if path.is_dir() {
                file_paths.extend(list_files(path));
            } else {
                file_paths.push(path.clone());
            }
        }
        Self {
            file_paths,
            collection_name: collection.into(),
            ..Self::default()
        }
    }

    /// State for a direct ingestion of already-loaded documents.
    ///
    /// Each id is the loader's id, else the `document_id` metadata entry, else
    /// derived from the `filename` metadata entry, else `doc_<index>`.
    pub fn from_loaded(loaded: Vec<LoadedDocument>, collection: impl Into<String>) -> Self {
        let mut state = Self {
            collection_name: collection.into(),
            ..Self::default()
        };
        for (i, doc) in loaded.into_iter().enumerate() {
            let id = if !doc.id.is_empty() {
                doc.id
            } else if let Some(id) = doc.metadata.get("document_id").and_then(|v| v.as_str()) {
                id.to_string()
            } else if let Some(name) = doc.metadata.get("filename").and_then(|v| v.as_str()) {
                document_id(i, Path::new(name))
            } else {
                format!("doc_{}", i)
            };
            state.document_ids.push(id);
            state.documents.push(doc.content);
            state.metadata.push(doc.metadata);
        }
        state
    }

    /// Append one document, naming it after the running id count.
    fn push_document(&mut self, path: &Path, content: String, mut metadata: Metadata) -> String {
        let id = document_id(self.document_ids.len(), path);
        if let Some(name) = path.file_name() {
            metadata
                .entry("filename")
                .or_insert_with(|| json!(name.to_string_lossy()));
        }
        self.documents.push(content);
        self.metadata.push(metadata);
        self.document_ids.push(id.clone());
        id
    }
}

impl WorkflowState for IngestState {
    fn history(&self) -> &[String] {
        &self.node_execution_history
    }

    fn history_mut(&mut self) -> &mut Vec<String> {
        &mut self.node_execution_history
    }
}

/// `doc_<index>_<stem>_type_<extension>`
pub fn document_id(index: usize, path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("doc_{}_{}_type_{}", index, stem, ext)
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to list directory");
            Vec::new()
        }
    };
    files.sort();
    files
}

fn direct_metadata(path: &Path, document_type: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), json!(path.display().to_string()));
    metadata.insert("document_type".into(), json!(document_type));
    metadata.insert("processed_with".into(), json!("direct"));
    metadata
}

/// Read a file as UTF-8.
async fn read_utf8(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    decode(path, bytes)
}

/// Read a file as UTF-8, refusing anything with a NUL byte in its first kilobyte.
async fn read_if_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.iter().take(SNIFF_LEN).any(|b| *b == 0) {
        return Err(NodeweaveError::UnsupportedDocument(format!(
            "{} looks binary",
            path.display()
        )));
    }
    decode(path, bytes)
}

fn decode(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| NodeweaveError::Load {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

pub struct IngestDependencies {
    pub store: Arc<dyn DocumentStore>,
    pub processor: Arc<dyn DocumentProcessor>,
    pub default_collection: String,
}

impl IngestDependencies {
    /// Use `store` with the built-in extractor.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            processor: Arc::new(ContentExtractor::new()),
            default_collection: "default_collection".to_string(),
        }
    }

    /// Open the SQLite store named by `[store]`.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let store = SqliteDocumentStore::open(&config.store_path())?;
        Ok(Self::new(Arc::new(store)).with_default_collection(&config.store.default_collection))
    }

    pub fn with_processor(mut self, processor: Arc<dyn DocumentProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_default_collection(mut self, collection: impl Into<String>) -> Self {
        self.default_collection = collection.into();
        self
    }
}

type IngestStep = Step<IngestState, IngestDependencies, AddResult>;

/// Sorts inputs into buckets and reads plain-text files itself.
pub struct FileTypeRouterNode;

/// Runs the document processor over the files the router left behind.
pub struct DocumentProcessorNode;

/// Writes the accumulated documents to the store.
pub struct IngestionNode;

impl Node<IngestState, IngestDependencies, AddResult> for FileTypeRouterNode {
    fn name(&self) -> &'static str {
        "FileTypeRouterNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::To("DocumentProcessorNode"), Edge::To("IngestionNode")]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::ContinueWithMessage
    }

    fn summary(&self, state: &IngestState) -> String {
        let r = &state.routing;
        format!(
            "Routed {} files: {} for processing, {} read directly, {} skipped, {} unreadable",
            r.total(),
            r.heavy.len(),
            r.direct.len(),
            r.skipped.len(),
            r.unreadable.len()
        )
    }

    fn run<'a>(
        &'a self,
        state: &'a mut IngestState,
        _deps: &'a IngestDependencies,
    ) -> BoxFuture<'a, Result<IngestStep>> {
        Box::pin(async move {
            let start = Instant::now();
            let inputs = std::mem::take(&mut state.file_paths);

            for path in inputs {
                let kind = classify(&path);
                match kind {
                    FileKind::Heavy => {
                        state.file_paths.push(path.clone());
                        state.routing.heavy.push(path);
                    }
                    FileKind::Skip => {
                        debug!(path = %path.display(), "Skipping file type");
                        state.routing.skipped.push(path);
                    }
                    FileKind::Text | FileKind::Unknown => {
                        let content = if kind == FileKind::Text {
                            read_utf8(&path).await
                        } else {
                            read_if_text(&path).await
                        };
                        let read = self
                            .error_policy()
                            .recover(self.name(), content.map(Some), |_| None)?;
                        match read {
                            Some(content) => {
                                let document_type =
                                    if kind == FileKind::Text { "text" } else { "unknown" };
                                let meta = direct_metadata(&path, document_type);
                                let id = state.push_document(&path, content, meta);
                                debug!(path = %path.display(), id = %id, "Read file directly");
                                state.routing.direct.push(path);
                            }
                            None => state.routing.unreadable.push(path),
                        }
                    }
                }
            }

            state.routing_time = start.elapsed().as_secs_f64();

            if state.file_paths.is_empty() {
                Ok(Step::next(IngestionNode))
            } else {
                Ok(Step::next(DocumentProcessorNode))
            }
        })
    }
}

impl Node<IngestState, IngestDependencies, AddResult> for DocumentProcessorNode {
    fn name(&self) -> &'static str {
        "DocumentProcessorNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::To("IngestionNode")]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::ContinueWithMessage
    }

    fn summary(&self, state: &IngestState) -> String {
        format!(
            "Processed {} of {} files",
            state.file_paths.len().saturating_sub(state.failed_files.len()),
            state.file_paths.len()
        )
    }

    fn run<'a>(
        &'a self,
        state: &'a mut IngestState,
        deps: &'a IngestDependencies,
    ) -> BoxFuture<'a, Result<IngestStep>> {
        Box::pin(async move {
            let start = Instant::now();
            let processor = &deps.processor;
            let available = processor.is_available();
            if !available {
                warn!(processor = processor.name(), "Processor unavailable, reading files as text");
            }

            for path in state.file_paths.clone() {
                let outcome = if available {
                    processor.process(&path).await.map(|doc| {
                        let mut meta = doc.metadata;
                        meta.entry("source")
                            .or_insert_with(|| json!(path.display().to_string()));
                        meta.entry("document_type")
                            .or_insert_with(|| json!(doc.document_type));
                        meta.entry("processed_with")
                            .or_insert_with(|| json!(processor.name()));
                        (doc.text, meta)
                    })
                } else {
                    read_utf8(&path)
                        .await
                        .map(|text| (text, direct_metadata(&path, "text")))
                };

                let processed = self.error_policy().recover(self.name(), outcome.map(Some), |e| {
                    warn!(path = %path.display(), error = %e, "Skipping file that failed processing");
                    None
                })?;

                match processed {
                    Some((text, meta)) => {
                        let id = state.push_document(&path, text, meta);
                        info!(path = %path.display(), id = %id, "Processed document");
                    }
                    None => state.failed_files.push(path),
                }
            }

            state.processing_time = start.elapsed().as_secs_f64();
            Ok(Step::next(IngestionNode))
        })
    }
}

impl Node<IngestState, IngestDependencies, AddResult> for IngestionNode {
    fn name(&self) -> &'static str {
        "IngestionNode"
    }

    fn edges(&self) -> &'static [Edge] {
        &[Edge::End]
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Propagate
    }

    fn summary(&self, state: &IngestState) -> String {
        match &state.ingestion_results {
            Some(AddResult {
                error: Some(message),
                ..
            }) => format!("Ingestion failed: {}", message),
            Some(result) => format!(
                "Ingested {} documents into '{}'",
                result.count, result.collection
            ),
            None => "Nothing ingested".to_string(),
        }
    }

    fn run<'a>(
        &'a self,
        state: &'a mut IngestState,
        deps: &'a IngestDependencies,
    ) -> BoxFuture<'a, Result<IngestStep>> {
        Box::pin(async move {
            let start = Instant::now();

            let result = if state.documents.is_empty() {
                warn!("No documents to ingest");
                AddResult::error(NO_DOCUMENTS_MESSAGE)
            } else {
                let collection = if state.collection_name.is_empty() {
                    deps.default_collection.clone()
                } else {
                    state.collection_name.clone()
                };
                let ids = (!state.document_ids.is_empty()).then(|| state.document_ids.clone());
                let metadata = (!state.metadata.is_empty()).then(|| state.metadata.clone());

                let added = deps
                    .store
                    .add_documents(&collection, state.documents.clone(), ids, metadata)
                    .await;
                self.error_policy()
                    .recover(self.name(), added, |e| AddResult::error(e.to_string()))?
            };

            state.ingestion_time = start.elapsed().as_secs_f64();
            state.total_time = state.ingestion_time;
            state.ingestion_results = Some(result.clone());
            Ok(Step::End(result))
        })
    }
}

pub fn graph() -> Graph<IngestState, IngestDependencies, AddResult> {
    Graph::new("ingest")
        .node(FileTypeRouterNode)
        .node(DocumentProcessorNode)
        .node(IngestionNode)
}

/// Route, process and store `state.file_paths`.
pub async fn ingest_files(
    state: &mut IngestState,
    deps: &IngestDependencies,
) -> Result<RunOutput<AddResult>> {
    graph().run(Box::new(FileTypeRouterNode), state, deps).await
}

/// Store documents already present in `state`, skipping the router.
pub async fn ingest_documents(
    state: &mut IngestState,
    deps: &IngestDependencies,
) -> Result<RunOutput<AddResult>> {
    graph().run(Box::new(IngestionNode), state, deps).await
}
