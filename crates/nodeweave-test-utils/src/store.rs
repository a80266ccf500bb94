use std::sync::Mutex;

use futures::future::BoxFuture;

use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::DocumentStore;
use nodeweave_core::types::{AddResult, Metadata, QueryResult};

/// Arguments of one `add_documents` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AddCall {
    pub collection: String,
    pub documents: Vec<String>,
    pub ids: Option<Vec<String>>,
    pub metadata: Option<Vec<Metadata>>,
}

/// In-memory store double: records adds, answers queries from a canned result,
/// and can be switched to fail either operation.
#[derive(Default)]
pub struct RecordingStore {
    adds: Mutex<Vec<AddCall>>,
    queries: Mutex<Vec<(String, Vec<String>, usize)>>,
    query_result: QueryResult,
    fail_add: Option<String>,
    fail_query: Option<String>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every query with one ranked list of `(content, metadata)` hits.
    pub fn with_hits(mut self, hits: Vec<(&str, Metadata)>) -> Self {
        let mut result = QueryResult::default();
        let mut ids = Vec::new();
        let mut documents = Vec::new();
        let mut metadatas = Vec::new();
        let mut scores = Vec::new();
        for (i, (content, meta)) in hits.into_iter().enumerate() {
            ids.push(format!("hit_{}", i));
            documents.push(content.to_string());
            metadatas.push(meta);
            scores.push(1.0 / (i as f64 + 1.0));
        }
        result.ids.push(ids);
        result.documents.push(documents);
        result.metadatas.push(metadatas);
        result.scores.push(scores);
        self.query_result = result;
        self
    }

    pub fn failing_add(mut self, message: impl Into<String>) -> Self {
        self.fail_add = Some(message.into());
        self
    }

    pub fn failing_query(mut self, message: impl Into<String>) -> Self {
        self.fail_query = Some(message.into());
        self
    }

    pub fn adds(&self) -> Vec<AddCall> {
        self.adds.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn queries(&self) -> Vec<(String, Vec<String>, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl DocumentStore for RecordingStore {
    fn add_documents(
        &self,
        collection: &str,
        documents: Vec<String>,
        ids: Option<Vec<String>>,
        metadata: Option<Vec<Metadata>>,
    ) -> BoxFuture<'_, Result<AddResult>> {
        let call = AddCall {
            collection: collection.to_string(),
            documents,
            ids,
            metadata,
        };

        Box::pin(async move {
            if let Ok(mut adds) = self.adds.lock() {
                adds.push(call.clone());
            }
            if let Some(message) = &self.fail_add {
                return Err(NodeweaveError::Store(message.clone()));
            }
            let ids = call.ids.unwrap_or_else(|| {
                (0..call.documents.len()).map(|i| format!("auto_{}", i)).collect()
            });
            Ok(AddResult::ok(call.collection, ids))
        })
    }

    fn query(
        &self,
        collection: &str,
        query_texts: Vec<String>,
        n_results: usize,
    ) -> BoxFuture<'_, Result<QueryResult>> {
        let collection = collection.to_string();

        Box::pin(async move {
            if let Ok(mut queries) = self.queries.lock() {
                queries.push((collection, query_texts, n_results));
            }
            if let Some(message) = &self.fail_query {
                return Err(NodeweaveError::Store(message.clone()));
            }
            Ok(self.query_result.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_is_recorded() {
        let store = RecordingStore::new();
        let result = store
            .add_documents("c", vec!["doc".into()], Some(vec!["id".into()]), None)
            .await
            .unwrap();

        assert_eq!(result, AddResult::ok("c", vec!["id".into()]));
        assert_eq!(store.adds().len(), 1);
        assert_eq!(store.adds()[0].documents, vec!["doc".to_string()]);
    }

    #[tokio::test]
    async fn test_query_failure() {
        let store = RecordingStore::new().failing_query("offline");
        assert!(store.query("c", vec!["q".into()], 3).await.is_err());
        assert_eq!(store.queries().len(), 1);
    }
}
