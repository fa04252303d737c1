// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

use crate::errors::ConfigurationError;
use crate::exec::PortSpec;
use crate::types::NodeId;
use crate::value::ValueType;

/// Static view of a node as the graph sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSignature {
    pub id: NodeId,
    /// Label if the node has one, operation name otherwise.
    pub name: String,
    pub operation: String,
    pub inputs: Vec<PortSpec>,
    pub output: ValueType,
}

/// One declared input port and the producer bound to it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub port: PortSpec,
    pub producer: Option<NodeId>,
}

#[derive(Debug, Clone)]
struct GraphNode {
    signature: NodeSignature,
    /// Parallel to `signature.inputs`.
    producers: Vec<Option<NodeId>>,
}

/// Dependency graph of a pipeline.
///
/// Edges run producer → consumer and carry the index of the consumer port
/// they bind. Node indices are never removed, so a node's index doubles as
/// its insertion rank for tie-breaking.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    graph: DiGraph<GraphNode, usize>,
    index: HashMap<NodeId, NodeIndex>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Fails if its identity is already present.
    pub fn add_node(&mut self, signature: NodeSignature) -> Result<(), ConfigurationError> {
        let id = signature.id;
        if self.index.contains_key(&id) {
            return Err(ConfigurationError::DuplicateNode(id));
        }

        let producers = vec![None; signature.inputs.len()];
        let idx = self.graph.add_node(GraphNode {
            signature,
            producers,
        });
        self.index.insert(id, idx);
        debug!(node = %id, rank = idx.index(), "graph: node added");
        Ok(())
    }

    /// Bind `producer`'s output to an input port of `consumer`.
    ///
    /// `port = None` selects the consumer's only input port. All checks run
    /// before anything is mutated, so a rejected edge leaves the graph as it
    /// was.
    pub fn add_edge(
        &mut self,
        producer: NodeId,
        consumer: NodeId,
        port: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        let p_idx = self.node_index(producer)?;
        let c_idx = self.node_index(consumer)?;

        let port_index = self.resolve_port(c_idx, port)?;
        let target = &self.graph[c_idx];
        let spec = target.signature.inputs[port_index];

        if let Some(existing) = target.producers[port_index] {
            return Err(ConfigurationError::DuplicatePortBinding {
                consumer,
                port: spec.name.to_string(),
                existing,
            });
        }

        let produced = self.graph[p_idx].signature.output;
        if produced != spec.ty {
            return Err(ConfigurationError::IncompatibleTypes {
                producer,
                consumer,
                port: spec.name.to_string(),
                produced,
                expected: spec.ty,
            });
        }

        // consumer ->* producer plus the new edge would be a cycle; this also
        // catches self-edges since every node reaches itself.
        if has_path_connecting(&self.graph, c_idx, p_idx, None) {
            return Err(ConfigurationError::CycleDetected { producer, consumer });
        }

        self.graph.add_edge(p_idx, c_idx, port_index);
        self.graph[c_idx].producers[port_index] = Some(producer);
        debug!(
            producer = %producer,
            consumer = %consumer,
            port = spec.name,
            "graph: edge added"
        );
        Ok(())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node identities in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().map(|n| n.signature.id)
    }

    pub fn signature(&self, id: NodeId) -> Option<&NodeSignature> {
        self.index.get(&id).map(|&idx| &self.graph[idx].signature)
    }

    /// Insertion rank of a node.
    pub fn rank(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).map(|idx| idx.index())
    }

    /// Declared input ports of `id` with their producers, in port order.
    pub fn bindings(&self, id: NodeId) -> Vec<Binding> {
        match self.index.get(&id) {
            Some(&idx) => {
                let node = &self.graph[idx];
                node.signature
                    .inputs
                    .iter()
                    .zip(&node.producers)
                    .map(|(port, producer)| Binding {
                        port: *port,
                        producer: *producer,
                    })
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Producers feeding `id`, in declared port order.
    ///
    /// The order is that of the consumer's port list, not the order edges
    /// were added in, so positional operations see their inputs where they
    /// expect them.
    pub fn predecessor_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.bindings(id).into_iter().filter_map(|b| b.producer).collect()
    }

    /// Consumers fed by `id`, one entry per edge.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        match self.index.get(&id) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| self.graph[n].signature.id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of bound input ports of `id`.
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.index
            .get(&id)
            .map(|&idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .unwrap_or(0)
    }

    /// One valid linearization, ties broken by insertion order.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut remaining: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(remaining.len());
        while let Some(Reverse(i)) = ready.pop() {
            let idx = NodeIndex::new(i);
            order.push(self.graph[idx].signature.id);
            for succ in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let deg = &mut remaining[succ.index()];
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse(succ.index()));
                }
            }
        }

        order
    }

    /// Fail on the first declared input port (in insertion order) that has
    /// no producer.
    pub fn ensure_inputs_bound(&self) -> Result<(), ConfigurationError> {
        for node in self.graph.node_weights() {
            for (spec, producer) in node.signature.inputs.iter().zip(&node.producers) {
                if producer.is_none() {
                    return Err(ConfigurationError::UnboundPort {
                        node: node.signature.id,
                        port: spec.name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn node_index(&self, id: NodeId) -> Result<NodeIndex, ConfigurationError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(ConfigurationError::UnknownNode(id))
    }

    fn resolve_port(&self, idx: NodeIndex, port: Option<&str>) -> Result<usize, ConfigurationError> {
        let sig = &self.graph[idx].signature;
        match port {
            Some(name) => sig
                .inputs
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| ConfigurationError::UnknownPort {
                    node: sig.id,
                    port: name.to_string(),
                }),
            None => match sig.inputs.len() {
                0 => Err(ConfigurationError::NoInputPorts { node: sig.id }),
                1 => Ok(0),
                _ => Err(ConfigurationError::AmbiguousPort { node: sig.id }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(inputs: Vec<PortSpec>, output: ValueType) -> NodeSignature {
        NodeSignature {
            id: NodeId::next(),
            name: "test".into(),
            operation: "test".into(),
            inputs,
            output,
        }
    }

    fn source(graph: &mut ExecutionGraph, ty: ValueType) -> NodeId {
        let s = sig(vec![], ty);
        let id = s.id;
        graph.add_node(s).unwrap();
        id
    }

    fn unary(graph: &mut ExecutionGraph, ty: ValueType) -> NodeId {
        let s = sig(vec![PortSpec::single(ty)], ty);
        let id = s.id;
        graph.add_node(s).unwrap();
        id
    }

    fn binary(graph: &mut ExecutionGraph, ty: ValueType) -> NodeId {
        let s = sig(
            vec![PortSpec::new("left", ty), PortSpec::new("right", ty)],
            ty,
        );
        let id = s.id;
        graph.add_node(s).unwrap();
        id
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut graph = ExecutionGraph::new();
        let s = sig(vec![], ValueType::Int);
        graph.add_node(s.clone()).unwrap();
        assert_eq!(graph.add_node(s.clone()), Err(ConfigurationError::DuplicateNode(s.id)));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn cycle_is_rejected_and_graph_unchanged() {
        let mut graph = ExecutionGraph::new();
        let a = unary(&mut graph, ValueType::Int);
        let b = unary(&mut graph, ValueType::Int);
        let c = unary(&mut graph, ValueType::Int);
        graph.add_edge(a, b, None).unwrap();
        graph.add_edge(b, c, None).unwrap();

        let err = graph.add_edge(c, a, None).unwrap_err();
        assert_eq!(err, ConfigurationError::CycleDetected { producer: c, consumer: a });
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.predecessor_ids(a).is_empty());
        assert_eq!(graph.topological_order(), vec![a, b, c]);
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let mut graph = ExecutionGraph::new();
        let a = unary(&mut graph, ValueType::Int);
        assert!(matches!(
            graph.add_edge(a, a, None),
            Err(ConfigurationError::CycleDetected { .. })
        ));
    }

    #[test]
    fn port_can_only_be_bound_once() {
        let mut graph = ExecutionGraph::new();
        let p1 = source(&mut graph, ValueType::Line);
        let p2 = source(&mut graph, ValueType::Line);
        let c = binary(&mut graph, ValueType::Line);

        graph.add_edge(p1, c, Some("left")).unwrap();
        let err = graph.add_edge(p2, c, Some("left")).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicatePortBinding {
                consumer: c,
                port: "left".into(),
                existing: p1
            }
        );
        assert_eq!(graph.in_degree(c), 1);
    }

    #[test]
    fn predecessors_follow_port_order_not_edge_order() {
        let mut graph = ExecutionGraph::new();
        let p1 = source(&mut graph, ValueType::Line);
        let p2 = source(&mut graph, ValueType::Line);
        let c = binary(&mut graph, ValueType::Line);

        graph.add_edge(p2, c, Some("right")).unwrap();
        graph.add_edge(p1, c, Some("left")).unwrap();

        assert_eq!(graph.predecessor_ids(c), vec![p1, p2]);
        assert_eq!(graph.in_degree(c), 2);
    }

    #[test]
    fn implicit_port_requires_exactly_one_input() {
        let mut graph = ExecutionGraph::new();
        let p = source(&mut graph, ValueType::Line);
        let q = source(&mut graph, ValueType::Line);
        let c = binary(&mut graph, ValueType::Line);

        assert_eq!(
            graph.add_edge(p, c, None),
            Err(ConfigurationError::AmbiguousPort { node: c })
        );
        assert_eq!(
            graph.add_edge(p, q, None),
            Err(ConfigurationError::NoInputPorts { node: q })
        );
        assert!(matches!(
            graph.add_edge(p, c, Some("middle")),
            Err(ConfigurationError::UnknownPort { .. })
        ));
    }

    #[test]
    fn types_are_checked_at_assembly() {
        let mut graph = ExecutionGraph::new();
        let p = source(&mut graph, ValueType::Point);
        let c = unary(&mut graph, ValueType::Matrix);
        assert!(matches!(
            graph.add_edge(p, c, None),
            Err(ConfigurationError::IncompatibleTypes {
                produced: ValueType::Point,
                expected: ValueType::Matrix,
                ..
            })
        ));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        let mut graph = ExecutionGraph::new();
        let a = source(&mut graph, ValueType::Int);
        let ghost = NodeId::next();
        assert_eq!(
            graph.add_edge(a, ghost, None),
            Err(ConfigurationError::UnknownNode(ghost))
        );
    }

    #[test]
    fn topological_ties_follow_insertion_order() {
        let mut graph = ExecutionGraph::new();
        let s1 = source(&mut graph, ValueType::Int);
        let s2 = source(&mut graph, ValueType::Int);
        let a = unary(&mut graph, ValueType::Int);
        let b = unary(&mut graph, ValueType::Int);
        let c = binary(&mut graph, ValueType::Int);

        graph.add_edge(s2, b, None).unwrap();
        graph.add_edge(s1, a, None).unwrap();
        graph.add_edge(b, c, Some("right")).unwrap();
        graph.add_edge(a, c, Some("left")).unwrap();

        assert_eq!(graph.topological_order(), vec![s1, s2, a, b, c]);
        assert_eq!(graph.successors(s1), vec![a]);
    }

    #[test]
    fn unbound_port_is_reported() {
        let mut graph = ExecutionGraph::new();
        let p = source(&mut graph, ValueType::Int);
        let c = binary(&mut graph, ValueType::Int);
        graph.add_edge(p, c, Some("left")).unwrap();

        assert_eq!(
            graph.ensure_inputs_bound(),
            Err(ConfigurationError::UnboundPort {
                node: c,
                port: "right".into()
            })
        );
    }

    #[test]
    fn same_producer_may_feed_two_ports() {
        let mut graph = ExecutionGraph::new();
        let p = source(&mut graph, ValueType::Int);
        let c = binary(&mut graph, ValueType::Int);
        graph.add_edge(p, c, Some("left")).unwrap();
        graph.add_edge(p, c, Some("right")).unwrap();

        assert_eq!(graph.predecessor_ids(c), vec![p, p]);
        assert_eq!(graph.successors(p).len(), 2);
        assert!(graph.ensure_inputs_bound().is_ok());
    }
}
