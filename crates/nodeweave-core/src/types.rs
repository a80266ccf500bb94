use serde::{Deserialize, Serialize};

/// Free-form document metadata, stored alongside the content.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Outcome of `DocumentStore::add_documents`.
///
/// A store reports recoverable problems (e.g. mismatched list lengths) through
/// `error` instead of failing the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddResult {
    pub fn ok(collection: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            success: true,
            count: ids.len(),
            collection: collection.into(),
            ids,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Ranked hits for a batch of query texts; the outer index is the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Metadata>>,
    /// Relevance per hit, higher is better.
    pub scores: Vec<Vec<f64>>,
}

impl QueryResult {
    /// Hits for the query at `index` as (content, metadata) pairs.
    pub fn hits(&self, index: usize) -> Vec<(String, Metadata)> {
        let docs = self.documents.get(index).cloned().unwrap_or_default();
        let metas = self.metadatas.get(index).cloned().unwrap_or_default();
        docs.into_iter()
            .enumerate()
            .map(|(i, doc)| (doc, metas.get(i).cloned().unwrap_or_default()))
            .collect()
    }
}

/// A document read from disk by the directory loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

/// Output of a `DocumentProcessor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub text: String,
    pub document_type: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Build a metadata map from string pairs.
pub fn metadata_from<I, K, V>(pairs: I) -> Metadata
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<serde_json::Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
