// src/engine/builder.rs

use std::sync::Arc;

use tracing::debug;

use crate::dag::{ExecutionGraph, NodeTable};
use crate::engine::Pipeline;
use crate::errors::ConfigurationError;
use crate::exec::ExecutableNode;
use crate::types::{NodeId, SchedulerOptions};

/// Assembles a [`Pipeline`].
///
/// Every structural check happens here: parameter validation on
/// `add_node`, port/type/cycle checks on `add_edge`, and unbound ports on
/// `build`. A rejected call leaves the builder unchanged.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    graph: ExecutionGraph,
    nodes: NodeTable,
    options: SchedulerOptions,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_options(&mut self, options: SchedulerOptions) {
        self.options = options;
    }

    /// Validate the node's parameters and register it.
    pub fn add_node(&mut self, node: ExecutableNode) -> Result<NodeId, ConfigurationError> {
        node.validate()?;
        let id = node.id();
        self.graph.add_node(node.signature())?;
        debug!(node = %id, name = node.display_name(), "pipeline: node registered");
        self.nodes.insert(id, Arc::new(node));
        Ok(id)
    }

    /// See [`ExecutionGraph::add_edge`].
    pub fn add_edge(
        &mut self,
        producer: NodeId,
        consumer: NodeId,
        port: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        self.graph.add_edge(producer, consumer, port)
    }

    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        self.graph.ensure_inputs_bound()?;
        Ok(Pipeline::new(self.graph, self.nodes, self.options))
    }
}
