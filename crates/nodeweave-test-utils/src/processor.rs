use std::path::Path;

use futures::future::BoxFuture;
use serde_json::json;

use nodeweave_core::error::{NodeweaveError, Result};
use nodeweave_core::traits::DocumentProcessor;
use nodeweave_core::types::{Metadata, ProcessedDocument};

/// Produces `"processed <file name>"` for every path without touching the disk.
///
/// Paths whose file name contains `fail_marker` fail with an extraction error.
#[derive(Debug, Clone, Default)]
pub struct StubProcessor {
    fail_marker: Option<String>,
}

impl StubProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self {
            fail_marker: Some(marker.into()),
        }
    }
}

impl DocumentProcessor for StubProcessor {
    fn name(&self) -> &str {
        "stub"
    }

    fn process<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ProcessedDocument>> {
        Box::pin(async move {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if let Some(marker) = &self.fail_marker {
                if file_name.contains(marker.as_str()) {
                    return Err(NodeweaveError::Extraction {
                        path: path.display().to_string(),
                        message: "stub failure".into(),
                    });
                }
            }

            let mut metadata = Metadata::new();
            metadata.insert("source".into(), json!(path.display().to_string()));
            metadata.insert("processed_with".into(), json!("stub"));
            Ok(ProcessedDocument {
                text: format!("processed {}", file_name),
                document_type: "stub".into(),
                metadata,
            })
        })
    }
}

/// A processor whose backend is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingProcessor;

impl DocumentProcessor for FailingProcessor {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn process<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ProcessedDocument>> {
        Box::pin(async move { Err(NodeweaveError::UnsupportedDocument(path.display().to_string())) })
    }
}
