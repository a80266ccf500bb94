use futures::future::BoxFuture;

use nodeweave_core::error::Result;

use super::policy::ErrorPolicy;

/// A successor a node may hand control to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Continue with the node of this name.
    To(&'static str),
    /// Finish the run with an output.
    End,
}

/// What a node step produced: the next node, or the run's output.
pub enum Step<S, D, O> {
    Next(Box<dyn Node<S, D, O>>),
    End(O),
}

impl<S, D, O> Step<S, D, O> {
    /// Continue with `node`.
    pub fn next(node: impl Node<S, D, O> + 'static) -> Self {
        Step::Next(Box::new(node))
    }

    /// The edge this step takes.
    pub fn edge(&self) -> Edge {
        match self {
            Step::Next(node) => Edge::To(node.name()),
            Step::End(_) => Edge::End,
        }
    }
}

impl<S, D, O: std::fmt::Debug> std::fmt::Debug for Step<S, D, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Next(node) => f.debug_tuple("Next").field(&node.name()).finish(),
            Step::End(output) => f.debug_tuple("End").field(output).finish(),
        }
    }
}

/// State shared by every node of a run. The history is append-only.
pub trait WorkflowState: Send {
    fn history(&self) -> &[String];
    fn history_mut(&mut self) -> &mut Vec<String>;
}

/// One unit of work in a workflow graph.
///
/// `S` is the state record, `D` the dependency container, `O` the run output.
/// Nodes carry no data of their own; everything they produce goes into `S`.
pub trait Node<S, D, O>: Send + Sync {
    /// Name used in history lines, traces and diagrams.
    fn name(&self) -> &'static str;

    /// Every successor `run` may return. Anything else is a contract violation.
    fn edges(&self) -> &'static [Edge];

    /// How collaborator failures inside `run` are handled.
    fn error_policy(&self) -> ErrorPolicy;

    /// One-line description of what this node contributed, read after `run` succeeds.
    fn summary(&self, state: &S) -> String;

    fn run<'a>(&'a self, state: &'a mut S, deps: &'a D) -> BoxFuture<'a, Result<Step<S, D, O>>>;
}
