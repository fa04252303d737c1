// src/engine/outcome.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dag::NodeRunState;
use crate::errors::ExecutionError;
use crate::pool::ResourcePool;
use crate::types::NodeId;

/// A node execution that failed with something other than cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub node: NodeId,
    /// Label if the node has one, operation name otherwise.
    pub name: String,
    pub operation: String,
    pub error: ExecutionError,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node '{}' {} ({}) failed: {}",
            self.name, self.node, self.operation, self.error
        )
    }
}

/// Everything observed during one pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub(crate) pass_id: u64,
    pub(crate) elapsed: Duration,
    pub(crate) states: HashMap<NodeId, NodeRunState>,
    pub(crate) pool: Arc<ResourcePool>,
    pub(crate) secondary: Vec<NodeFailure>,
}

impl PassReport {
    pub fn pass_id(&self) -> u64 {
        self.pass_id
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The pool this pass wrote into. Holds every published output,
    /// including those of a failed or cancelled pass.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn state_of(&self, id: NodeId) -> Option<NodeRunState> {
        self.states.get(&id).copied()
    }

    pub fn states(&self) -> &HashMap<NodeId, NodeRunState> {
        &self.states
    }

    /// Number of nodes in the given state.
    pub fn count(&self, state: NodeRunState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// Failures observed after the one that halted the pass.
    pub fn secondary_failures(&self) -> &[NodeFailure] {
        &self.secondary
    }
}

/// Result of [`Pipeline::run_pass`](super::Pipeline::run_pass).
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// Every node executed and published its output.
    Completed(PassReport),
    /// The caller's signal was raised; no node failed.
    Cancelled(PassReport),
    /// A node failed and the pass was halted.
    Failed {
        failure: NodeFailure,
        report: PassReport,
    },
}

impl PassOutcome {
    pub fn report(&self) -> &PassReport {
        match self {
            PassOutcome::Completed(report) | PassOutcome::Cancelled(report) => report,
            PassOutcome::Failed { report, .. } => report,
        }
    }

    pub fn into_report(self) -> PassReport {
        match self {
            PassOutcome::Completed(report) | PassOutcome::Cancelled(report) => report,
            PassOutcome::Failed { report, .. } => report,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PassOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PassOutcome::Cancelled(_))
    }

    pub fn failure(&self) -> Option<&NodeFailure> {
        match self {
            PassOutcome::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
