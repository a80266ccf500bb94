use std::fmt::Write as _;
use std::str::FromStr;

use nodeweave_core::error::{NodeweaveError, Result};

use super::executor::{self, RunOutput};
use super::node::{Edge, Node, WorkflowState};

/// Layout direction for rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Top to bottom.
    #[default]
    TB,
    /// Left to right.
    LR,
    /// Right to left.
    RL,
    /// Bottom to top.
    BT,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TB => "TB",
            Direction::LR => "LR",
            Direction::RL => "RL",
            Direction::BT => "BT",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TB" | "TD" => Ok(Direction::TB),
            "LR" => Ok(Direction::LR),
            "RL" => Ok(Direction::RL),
            "BT" => Ok(Direction::BT),
            other => Err(format!("unknown direction '{}' (expected TB, LR, RL or BT)", other)),
        }
    }
}

/// A named set of nodes forming one workflow.
///
/// The first registered node is the conventional entry point used when
/// rendering. Running through a `Graph` also rejects nodes that were never
/// registered with it.
pub struct Graph<S, D, O> {
    name: &'static str,
    nodes: Vec<Box<dyn Node<S, D, O>>>,
}

impl<S, D, O> Graph<S, D, O> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            nodes: Vec::new(),
        }
    }

    /// Register a node. Registering the same name twice keeps the first.
    pub fn node(mut self, node: impl Node<S, D, O> + 'static) -> Self {
        if !self.contains(node.name()) {
            self.nodes.push(Box::new(node));
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name() == name)
    }

    pub fn node_names(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    /// Check that every declared edge points at a registered node.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            for edge in node.edges() {
                if let Edge::To(target) = edge {
                    if !self.contains(target) {
                        return Err(NodeweaveError::ContractViolation {
                            node: node.name().to_string(),
                            message: format!(
                                "edge to '{}' which is not part of graph '{}'",
                                target, self.name
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Render the declared edges as a Mermaid state diagram.
    pub fn mermaid(&self, direction: Direction) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "---\ntitle: {}\n---", self.name);
        out.push_str("stateDiagram-v2\n");
        let _ = writeln!(out, "  direction {}", direction.as_str());

        if let Some(first) = self.nodes.first() {
            let _ = writeln!(out, "  [*] --> {}", first.name());
        }
        for node in &self.nodes {
            for edge in node.edges() {
                let target = match edge {
                    Edge::To(name) => *name,
                    Edge::End => "[*]",
                };
                let _ = writeln!(out, "  {} --> {}", node.name(), target);
            }
        }
        out
    }
}

impl<S, D, O> Graph<S, D, O>
where
    S: WorkflowState,
{
    /// Run from `start`, which must be registered, like `run_graph`.
    pub async fn run(
        &self,
        start: Box<dyn Node<S, D, O>>,
        state: &mut S,
        deps: &D,
    ) -> Result<RunOutput<O>> {
        executor::drive(start, state, deps, &|name| self.contains(name)).await
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::graph::node::Step;
    use crate::graph::policy::ErrorPolicy;

    #[derive(Default)]
    struct Log {
        history: Vec<String>,
    }

    impl WorkflowState for Log {
        fn history(&self) -> &[String] {
            &self.history
        }
        fn history_mut(&mut self) -> &mut Vec<String> {
            &mut self.history
        }
    }

    struct First;
    struct Second;

    impl Node<Log, (), ()> for First {
        fn name(&self) -> &'static str {
            "First"
        }
        fn edges(&self) -> &'static [Edge] {
            &[Edge::To("Second")]
        }
        fn error_policy(&self) -> ErrorPolicy {
            ErrorPolicy::Propagate
        }
        fn summary(&self, _state: &Log) -> String {
            "ok".into()
        }
        fn run<'a>(&'a self, _: &'a mut Log, _: &'a ()) -> BoxFuture<'a, Result<Step<Log, (), ()>>> {
            Box::pin(async move { Ok(Step::next(Second)) })
        }
    }

    impl Node<Log, (), ()> for Second {
        fn name(&self) -> &'static str {
            "Second"
        }
        fn edges(&self) -> &'static [Edge] {
            &[Edge::End]
        }
        fn error_policy(&self) -> ErrorPolicy {
            ErrorPolicy::Propagate
        }
        fn summary(&self, _state: &Log) -> String {
            "done".into()
        }
        fn run<'a>(&'a self, _: &'a mut Log, _: &'a ()) -> BoxFuture<'a, Result<Step<Log, (), ()>>> {
            Box::pin(async move { Ok(Step::End(())) })
        }
    }

    #[test]
    fn test_mermaid_lists_edges() {
        let graph = Graph::new("pair").node(First).node(Second);
        let diagram = graph.mermaid(Direction::LR);

        assert!(diagram.contains("title: pair"));
        assert!(diagram.contains("direction LR"));
        assert!(diagram.contains("[*] --> First"));
        assert!(diagram.contains("First --> Second"));
        assert!(diagram.contains("Second --> [*]"));
    }

    #[test]
    fn test_validate_catches_dangling_edge() {
        let complete = Graph::new("pair").node(First).node(Second);
        assert!(complete.validate().is_ok());

        let dangling = Graph::new("half").node(First);
        assert!(dangling.validate().is_err());
    }

    #[tokio::test]
    async fn test_run_rejects_unregistered_successor() {
        let graph = Graph::new("half").node(First);
        let mut state = Log::default();
        let err = graph
            .run(Box::new(First), &mut state, &())
            .await
            .unwrap_err();

        assert!(matches!(err, NodeweaveError::ContractViolation { ref node, .. } if node == "Second"));
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("lr".parse::<Direction>().unwrap(), Direction::LR);
        assert_eq!("TD".parse::<Direction>().unwrap(), Direction::TB);
        assert!("diagonal".parse::<Direction>().is_err());
    }
}
