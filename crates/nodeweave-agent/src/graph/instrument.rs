use std::time::Instant;

use tracing::{debug, error};

use nodeweave_core::error::{NodeweaveError, Result};

use super::node::{Node, Step, WorkflowState};

/// Run one node step with timing, edge checking and history capture.
///
/// Success appends `"<Node>: <summary> (took <secs>s)"`. Failure appends
/// `"<Node>: Error - <message>"` and returns the error wrapped in
/// `NodeFailed`; a contract violation is returned as-is since it already
/// names the node.
pub async fn step<N, S, D, O>(node: &N, state: &mut S, deps: &D) -> Result<Step<S, D, O>>
where
    N: Node<S, D, O> + ?Sized,
    S: WorkflowState,
{
    let name = node.name();
    let start = Instant::now();
    let outcome = match node.run(state, deps).await {
        Ok(step) => check_edge(node, step),
        Err(e) => Err(e),
    };
    let elapsed = start.elapsed().as_secs_f64();

    match outcome {
        Ok(step) => {
            let summary = node.summary(state);
            debug!(node = name, elapsed_s = elapsed, summary = %summary, "Node completed");
            state
                .history_mut()
                .push(format!("{}: {} (took {:.3}s)", name, summary, elapsed));
            Ok(step)
        }
        Err(e) => {
            error!(node = name, elapsed_s = elapsed, error = %e, "Node failed");
            state.history_mut().push(format!("{}: Error - {}", name, e));
            match e {
                NodeweaveError::ContractViolation { .. } => Err(e),
                other => Err(NodeweaveError::NodeFailed {
                    node: name.to_string(),
                    source: Box::new(other),
                }),
            }
        }
    }
}

fn check_edge<N, S, D, O>(node: &N, step: Step<S, D, O>) -> Result<Step<S, D, O>>
where
    N: Node<S, D, O> + ?Sized,
{
    let edge = step.edge();
    if node.edges().contains(&edge) {
        Ok(step)
    } else {
        Err(NodeweaveError::ContractViolation {
            node: node.name().to_string(),
            message: format!(
                "returned undeclared successor {:?} (declared: {:?})",
                edge,
                node.edges()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::graph::node::Edge;
    use crate::graph::policy::ErrorPolicy;

    #[derive(Default)]
    struct Tally {
        value: u32,
        history: Vec<String>,
    }

    impl WorkflowState for Tally {
        fn history(&self) -> &[String] {
            &self.history
        }
        fn history_mut(&mut self) -> &mut Vec<String> {
            &mut self.history
        }
    }

    /// Adds one, then ends or fails depending on the dependency flag.
    struct Bump;

    impl Node<Tally, Option<&'static str>, u32> for Bump {
        fn name(&self) -> &'static str {
            "Bump"
        }
        fn edges(&self) -> &'static [Edge] {
            &[Edge::End]
        }
        fn error_policy(&self) -> ErrorPolicy {
            ErrorPolicy::Propagate
        }
        fn summary(&self, state: &Tally) -> String {
            format!("value is {}", state.value)
        }
        fn run<'a>(
            &'a self,
            state: &'a mut Tally,
            deps: &'a Option<&'static str>,
        ) -> BoxFuture<'a, Result<Step<Tally, Option<&'static str>, u32>>> {
            Box::pin(async move {
                state.value += 1;
                match deps {
                    Some(msg) => Err(NodeweaveError::Store(msg.to_string())),
                    None => Ok(Step::End(state.value)),
                }
            })
        }
    }

    /// Declares only `End` but loops back to itself.
    struct Rogue;

    impl Node<Tally, Option<&'static str>, u32> for Rogue {
        fn name(&self) -> &'static str {
            "Rogue"
        }
        fn edges(&self) -> &'static [Edge] {
            &[Edge::End]
        }
        fn error_policy(&self) -> ErrorPolicy {
            ErrorPolicy::Propagate
        }
        fn summary(&self, _state: &Tally) -> String {
            String::new()
        }
        fn run<'a>(
            &'a self,
            _state: &'a mut Tally,
            _deps: &'a Option<&'static str>,
        ) -> BoxFuture<'a, Result<Step<Tally, Option<&'static str>, u32>>> {
            Box::pin(async move { Ok(Step::next(Rogue)) })
        }
    }

    #[tokio::test]
    async fn test_success_records_summary_and_timing() {
        let mut state = Tally::default();
        let step = step(&Bump, &mut state, &None).await.unwrap();

        assert!(matches!(step, Step::End(1)));
        assert_eq!(state.history.len(), 1);
        assert!(state.history[0].starts_with("Bump: value is 1 (took "));
        assert!(state.history[0].ends_with("s)"));
    }

    #[tokio::test]
    async fn test_failure_records_error_and_wraps() {
        let mut state = Tally::default();
        let err = step(&Bump, &mut state, &Some("disk full")).await.unwrap_err();

        assert_eq!(err.node(), Some("Bump"));
        assert!(matches!(err.root_cause(), NodeweaveError::Store(_)));
        assert_eq!(
            state.history,
            vec!["Bump: Error - Document store error: disk full".to_string()]
        );
        // mutation before the failure stays visible
        assert_eq!(state.value, 1);
    }

    #[tokio::test]
    async fn test_undeclared_successor_is_a_contract_violation() {
        let mut state = Tally::default();
        let err = step(&Rogue, &mut state, &None).await.unwrap_err();

        assert!(matches!(err, NodeweaveError::ContractViolation { ref node, .. } if node == "Rogue"));
        assert!(state.history[0].starts_with("Rogue: Error - "));
    }
}
