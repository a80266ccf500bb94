//! Node-graph engine.
//!
//! A workflow is a set of `Node`s sharing one mutable state record and one
//! read-only dependency container. Each node performs a single step and hands
//! back either its successor or the terminal output; the runner drives nodes
//! one at a time until the terminal output appears.
//!
//! Every step goes through `instrument::step`, which times it, checks the
//! returned successor against the node's declared edges, and appends a line
//! to the state's execution history.

pub mod executor;
pub mod instrument;
pub mod node;
pub mod policy;
pub mod registry;

pub use executor::{run_graph, RunOutput, TraceEntry};
pub use node::{Edge, Node, Step, WorkflowState};
pub use policy::ErrorPolicy;
pub use registry::{Direction, Graph};
