//! The concrete workflows built on the graph engine.

pub mod chat;
pub mod hello;
pub mod ingest;
pub mod rag;

/// Names accepted by [`render_mermaid`].
pub const WORKFLOW_NAMES: &[&str] = &["hello", "chat", "ingest", "rag"];

/// Mermaid diagram for a workflow by name, or `None` if the name is unknown.
pub fn render_mermaid(workflow: &str, direction: crate::graph::Direction) -> Option<String> {
    match workflow {
        "hello" => Some(hello::graph().mermaid(direction)),
        "chat" => Some(chat::graph().mermaid(direction)),
        "ingest" => Some(ingest::graph().mermaid(direction)),
        "rag" => Some(rag::graph().mermaid(direction)),
        _ => None,
    }
}
