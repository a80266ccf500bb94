use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use nodeweave_core::error::{NodeweaveError, Result};

use super::instrument;
use super::node::{Node, Step, WorkflowState};

/// One entry of a run trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceEntry {
    Node(&'static str),
    End,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEntry::Node(name) => f.write_str(name),
            TraceEntry::End => f.write_str("End"),
        }
    }
}

/// Result of a completed run. The final state stays with the caller.
#[derive(Debug, Clone)]
pub struct RunOutput<O> {
    /// Payload of the terminal step.
    pub output: O,
    /// Nodes visited in order, closed by `TraceEntry::End`.
    pub trace: Vec<TraceEntry>,
}

/// Drive a workflow from `start` until a node returns `Step::End`.
///
/// `state` is mutated in place. On error the run stops at once and the
/// caller keeps whatever the nodes had already written. There is no step
/// limit; graphs are expected to be acyclic.
pub async fn run_graph<S, D, O>(
    start: Box<dyn Node<S, D, O>>,
    state: &mut S,
    deps: &D,
) -> Result<RunOutput<O>>
where
    S: WorkflowState,
{
    drive(start, state, deps, &|_| true).await
}

/// Shared loop behind `run_graph` and `Graph::run`; `allowed` rejects nodes
/// that are not part of the graph being run.
pub(crate) async fn drive<S, D, O>(
    start: Box<dyn Node<S, D, O>>,
    state: &mut S,
    deps: &D,
    allowed: &(dyn Fn(&str) -> bool + Sync),
) -> Result<RunOutput<O>>
where
    S: WorkflowState,
{
    let run_start = Instant::now();
    let mut current = start;
    let mut trace = Vec::new();

    info!(start = current.name(), "Graph run started");

    loop {
        let name = current.name();
        if !allowed(name) {
            return Err(NodeweaveError::ContractViolation {
                node: name.to_string(),
                message: "node is not registered in this graph".into(),
            });
        }
        trace.push(TraceEntry::Node(name));

        match instrument::step(current.as_ref(), state, deps).await? {
            Step::Next(next) => {
                debug!(from = name, to = next.name(), "Transition");
                current = next;
            }
            Step::End(output) => {
                trace.push(TraceEntry::End);
                info!(
                    steps = trace.len() - 1,
                    elapsed_ms = run_start.elapsed().as_millis() as u64,
                    "Graph run finished"
                );
                return Ok(RunOutput { output, trace });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::graph::node::Edge;
    use crate::graph::policy::ErrorPolicy;

    #[derive(Default)]
    struct Countdown {
        remaining: u32,
        history: Vec<String>,
    }

    impl WorkflowState for Countdown {
        fn history(&self) -> &[String] {
            &self.history
        }
        fn history_mut(&mut self) -> &mut Vec<String> {
            &mut self.history
        }
    }

    struct Tick;

    impl Node<Countdown, (), &'static str> for Tick {
        fn name(&self) -> &'static str {
            "Tick"
        }
        fn edges(&self) -> &'static [Edge] {
            &[Edge::To("Tick"), Edge::End]
        }
        fn error_policy(&self) -> ErrorPolicy {
            ErrorPolicy::Propagate
        }
        fn summary(&self, state: &Countdown) -> String {
            format!("{} left", state.remaining)
        }
        fn run<'a>(
            &'a self,
            state: &'a mut Countdown,
            _deps: &'a (),
        ) -> BoxFuture<'a, Result<Step<Countdown, (), &'static str>>> {
            Box::pin(async move {
                if state.remaining == 0 {
                    return Ok(Step::End("liftoff"));
                }
                state.remaining -= 1;
                Ok(Step::next(Tick))
            })
        }
    }

    #[tokio::test]
    async fn test_trace_has_one_entry_per_step_plus_end() {
        let mut state = Countdown {
            remaining: 2,
            ..Countdown::default()
        };
        let run = run_graph(Box::new(Tick), &mut state, &()).await.unwrap();

        assert_eq!(run.output, "liftoff");
        assert_eq!(
            run.trace,
            vec![
                TraceEntry::Node("Tick"),
                TraceEntry::Node("Tick"),
                TraceEntry::Node("Tick"),
                TraceEntry::End
            ]
        );
        assert_eq!(state.history.len(), 3);
        assert!(state.history[0].starts_with("Tick: 1 left"));
        assert!(state.history[2].starts_with("Tick: 0 left"));
    }

    #[tokio::test]
    async fn test_disallowed_node_is_rejected() {
        let mut state = Countdown::default();
        let err = drive(Box::new(Tick), &mut state, &(), &|name| name != "Tick")
            .await
            .unwrap_err();
        assert!(matches!(err, NodeweaveError::ContractViolation { .. }));
        assert!(state.history.is_empty());
    }
}
