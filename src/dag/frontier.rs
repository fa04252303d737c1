// src/dag/frontier.rs

//! Per-pass readiness bookkeeping.
//!
//! [`Frontier`] is a synchronous state machine with no Tokio types in it. It
//! tracks, for one pass:
//! - how many bound inputs of each node are still unpublished,
//! - the run state of every node,
//! - the readiness frontier (not started, all predecessors succeeded).
//!
//! The async scheduler drives it; tests can step it by hand.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dag::graph::ExecutionGraph;
use crate::types::NodeId;

/// State of one node within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRunState {
    /// Never dispatched in this pass.
    NotStarted,
    /// Dispatched; its unit of work has not returned yet.
    Running,
    /// Executed and published its output.
    Succeeded,
    /// Returned an error other than cancellation.
    Failed,
    /// Observed the cancellation signal and stopped without publishing.
    Cancelled,
}

impl NodeRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeRunState::Succeeded | NodeRunState::Failed | NodeRunState::Cancelled
        )
    }
}

/// Result of recording one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierStep {
    /// Nodes whose last outstanding predecessor just completed.
    pub newly_ready: Vec<NodeId>,
    /// Whether every node has now succeeded.
    pub pass_complete: bool,
}

#[derive(Debug, Clone)]
pub struct Frontier {
    rank: HashMap<NodeId, usize>,
    remaining: HashMap<NodeId, usize>,
    successors: HashMap<NodeId, Vec<NodeId>>,
    states: HashMap<NodeId, NodeRunState>,
    ready: Vec<NodeId>,
    succeeded: usize,
}

impl Frontier {
    /// Initial frontier: every node without bound inputs is ready.
    pub fn new(graph: &ExecutionGraph) -> Self {
        let mut rank = HashMap::new();
        let mut remaining = HashMap::new();
        let mut successors = HashMap::new();
        let mut states = HashMap::new();
        let mut ready = Vec::new();

        for (i, id) in graph.node_ids().enumerate() {
            let deg = graph.in_degree(id);
            rank.insert(id, i);
            remaining.insert(id, deg);
            successors.insert(id, graph.successors(id));
            states.insert(id, NodeRunState::NotStarted);
            if deg == 0 {
                ready.push(id);
            }
        }

        Self {
            rank,
            remaining,
            successors,
            states,
            ready,
            succeeded: 0,
        }
    }

    /// Drain the current frontier, in insertion order.
    pub fn take_ready(&mut self) -> Vec<NodeId> {
        let mut ready = std::mem::take(&mut self.ready);
        ready.sort_by_key(|id| self.rank.get(id).copied().unwrap_or(usize::MAX));
        ready
    }

    pub fn mark_running(&mut self, id: NodeId) {
        self.transition(id, NodeRunState::Running);
    }

    /// Record a successful execution and release its successors.
    pub fn complete(&mut self, id: NodeId) -> FrontierStep {
        if !self.transition(id, NodeRunState::Succeeded) {
            return FrontierStep {
                newly_ready: Vec::new(),
                pass_complete: self.is_complete(),
            };
        }
        self.succeeded += 1;

        let mut newly_ready = Vec::new();
        let successors = self.successors.get(&id).cloned().unwrap_or_default();
        for succ in successors {
            let Some(left) = self.remaining.get_mut(&succ) else {
                warn!(node = %succ, "successor missing from frontier");
                continue;
            };
            *left = left.saturating_sub(1);
            if *left == 0 && self.states.get(&succ) == Some(&NodeRunState::NotStarted) {
                debug!(node = %succ, "all predecessors published; node ready");
                newly_ready.push(succ);
            }
        }

        newly_ready.sort_by_key(|n| self.rank.get(n).copied().unwrap_or(usize::MAX));
        self.ready.extend(newly_ready.iter().copied());

        FrontierStep {
            newly_ready,
            pass_complete: self.is_complete(),
        }
    }

    pub fn fail(&mut self, id: NodeId) {
        self.transition(id, NodeRunState::Failed);
    }

    pub fn cancel(&mut self, id: NodeId) {
        self.transition(id, NodeRunState::Cancelled);
    }

    /// Forget the pending frontier; used once a pass halts.
    pub fn clear_ready(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.ready)
    }

    pub fn state_of(&self, id: NodeId) -> Option<NodeRunState> {
        self.states.get(&id).copied()
    }

    pub fn states(&self) -> &HashMap<NodeId, NodeRunState> {
        &self.states
    }

    pub fn into_states(self) -> HashMap<NodeId, NodeRunState> {
        self.states
    }

    /// Every node succeeded.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.states.len()
    }

    pub fn running(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == NodeRunState::Running)
            .count()
    }

    /// Returns `true` if the state actually changed.
    fn transition(&mut self, id: NodeId, to: NodeRunState) -> bool {
        match self.states.get_mut(&id) {
            Some(state) if *state == to => false,
            Some(state) if state.is_terminal() => {
                let from = *state;
                warn!(node = %id, ?from, ?to, "ignoring transition out of terminal state");
                false
            }
            Some(state) => {
                *state = to;
                true
            }
            None => {
                warn!(node = %id, "unknown node in frontier; ignoring");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::graph::NodeSignature;
    use crate::exec::PortSpec;
    use crate::value::ValueType;

    fn add(graph: &mut ExecutionGraph, inputs: Vec<PortSpec>) -> NodeId {
        let id = NodeId::next();
        graph
            .add_node(NodeSignature {
                id,
                name: "n".into(),
                operation: "n".into(),
                inputs,
                output: ValueType::Int,
            })
            .unwrap();
        id
    }

    /// `s1 -> a`, `s2 -> b`, `(a, b) -> c`
    fn diamond() -> (ExecutionGraph, [NodeId; 5]) {
        let mut g = ExecutionGraph::new();
        let s1 = add(&mut g, vec![]);
        let s2 = add(&mut g, vec![]);
        let a = add(&mut g, vec![PortSpec::single(ValueType::Int)]);
        let b = add(&mut g, vec![PortSpec::single(ValueType::Int)]);
        let c = add(
            &mut g,
            vec![
                PortSpec::new("left", ValueType::Int),
                PortSpec::new("right", ValueType::Int),
            ],
        );
        g.add_edge(s1, a, None).unwrap();
        g.add_edge(s2, b, None).unwrap();
        g.add_edge(a, c, Some("left")).unwrap();
        g.add_edge(b, c, Some("right")).unwrap();
        (g, [s1, s2, a, b, c])
    }

    #[test]
    fn sources_form_the_initial_frontier() {
        let (g, [s1, s2, ..]) = diamond();
        let mut f = Frontier::new(&g);
        assert_eq!(f.take_ready(), vec![s1, s2]);
        assert!(f.take_ready().is_empty());
    }

    #[test]
    fn join_node_waits_for_all_predecessors() {
        let (g, [s1, s2, a, b, c]) = diamond();
        let mut f = Frontier::new(&g);
        for id in f.take_ready() {
            f.mark_running(id);
        }

        assert_eq!(f.complete(s1).newly_ready, vec![a]);
        assert_eq!(f.complete(s2).newly_ready, vec![b]);
        f.mark_running(a);
        f.mark_running(b);
        assert!(f.complete(a).newly_ready.is_empty());
        assert_eq!(f.state_of(c), Some(NodeRunState::NotStarted));

        let step = f.complete(b);
        assert_eq!(step.newly_ready, vec![c]);
        assert!(!step.pass_complete);

        f.mark_running(c);
        assert!(f.complete(c).pass_complete);
    }

    #[test]
    fn failure_leaves_successors_not_started() {
        let (g, [s1, s2, a, _b, c]) = diamond();
        let mut f = Frontier::new(&g);
        f.take_ready();
        f.mark_running(s1);
        f.mark_running(s2);
        f.fail(s1);

        assert_eq!(f.state_of(a), Some(NodeRunState::NotStarted));
        assert_eq!(f.state_of(c), Some(NodeRunState::NotStarted));
        assert!(!f.is_complete());
        assert_eq!(f.running(), 1);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let (g, [s1, ..]) = diamond();
        let mut f = Frontier::new(&g);
        f.mark_running(s1);
        f.cancel(s1);
        f.complete(s1);
        assert_eq!(f.state_of(s1), Some(NodeRunState::Cancelled));
    }
}
