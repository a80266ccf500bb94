use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeweaveError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Store errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Document store error: {0}")]
    Store(String),

    // Loader / extraction errors
    #[error("Failed to load {path}: {message}")]
    Load { path: String, message: String },

    #[error("Unsupported document type: {0}")]
    UnsupportedDocument(String),

    #[error("Document extraction failed: {path}: {message}")]
    Extraction { path: String, message: String },

    // Graph errors
    #[error("Node {node} failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: Box<NodeweaveError>,
    },

    #[error("Node {node} broke its contract: {message}")]
    ContractViolation { node: String, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NodeweaveError {
    /// Name of the node that failed, for errors raised by the graph runner.
    pub fn node(&self) -> Option<&str> {
        match self {
            NodeweaveError::NodeFailed { node, .. }
            | NodeweaveError::ContractViolation { node, .. } => Some(node),
            _ => None,
        }
    }

    /// The innermost cause, unwrapping any `NodeFailed` layers.
    pub fn root_cause(&self) -> &NodeweaveError {
        match self {
            NodeweaveError::NodeFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, NodeweaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_failed_display_includes_cause() {
        let err = NodeweaveError::NodeFailed {
            node: "HelloNode".into(),
            source: Box::new(NodeweaveError::LlmRequest("503".into())),
        };
        assert_eq!(
            err.to_string(),
            "Node HelloNode failed: LLM request failed: 503"
        );
        assert_eq!(err.node(), Some("HelloNode"));
    }

    #[test]
    fn test_root_cause_unwraps_nested_failures() {
        let err = NodeweaveError::NodeFailed {
            node: "Outer".into(),
            source: Box::new(NodeweaveError::NodeFailed {
                node: "Inner".into(),
                source: Box::new(NodeweaveError::Store("disk full".into())),
            }),
        };
        assert!(matches!(err.root_cause(), NodeweaveError::Store(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: NodeweaveError = io.into();
        assert!(matches!(err, NodeweaveError::Io(_)));
    }
}
