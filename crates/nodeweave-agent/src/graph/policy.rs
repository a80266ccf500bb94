use tracing::warn;

use nodeweave_core::error::{NodeweaveError, Result};

/// What a node does when one of its collaborators fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the error; the run aborts.
    Propagate,
    /// Fold the error into the node's output field and carry on to the usual successor.
    ContinueWithMessage,
}

impl ErrorPolicy {
    /// Apply the policy to a collaborator result.
    ///
    /// Under `ContinueWithMessage` a failure becomes `fallback(&err)`; under
    /// `Propagate` it is returned unchanged.
    pub fn recover<T>(
        self,
        node: &str,
        result: Result<T>,
        fallback: impl FnOnce(&NodeweaveError) -> T,
    ) -> Result<T> {
        match (self, result) {
            (_, Ok(value)) => Ok(value),
            (ErrorPolicy::ContinueWithMessage, Err(e)) => {
                warn!(node, error = %e, "Collaborator failed, continuing with fallback");
                Ok(fallback(&e))
            }
            (ErrorPolicy::Propagate, Err(e)) => Err(e),
        }
    }
}
