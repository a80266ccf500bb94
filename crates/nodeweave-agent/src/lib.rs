pub mod graph;
pub mod workflows;

pub use graph::{
    run_graph, Direction, Edge, ErrorPolicy, Graph, Node, RunOutput, Step, TraceEntry,
    WorkflowState,
};
