// src/exec/node.rs

//! Executable node: generic pool plumbing around an [`Operation`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::dag::graph::{ExecutionGraph, NodeSignature};
use crate::errors::{ConfigurationError, ExecutionError, PoolError};
use crate::exec::cancel::CancellationSignal;
use crate::exec::operation::{Inputs, Operation};
use crate::exec::params::Parameters;
use crate::pool::ResourcePool;
use crate::types::{NodeId, OUTPUT_PORT};

/// Everything a node needs from its pass, passed explicitly.
#[derive(Debug, Clone)]
pub struct PassContext {
    pub pass_id: u64,
    pub graph: Arc<ExecutionGraph>,
    pub pool: Arc<ResourcePool>,
    pub cancel: CancellationSignal,
}

impl PassContext {
    pub fn new(
        pass_id: u64,
        graph: Arc<ExecutionGraph>,
        pool: Arc<ResourcePool>,
        cancel: CancellationSignal,
    ) -> Self {
        Self {
            pass_id,
            graph,
            pool,
            cancel,
        }
    }
}

/// A node of the pipeline.
///
/// Holds only its own identity, operation and parameters; other nodes are
/// reached through the graph and the pool of the current pass.
pub struct ExecutableNode {
    id: NodeId,
    label: Option<String>,
    op: Box<dyn Operation>,
    params: Parameters,
}

impl ExecutableNode {
    pub fn new(op: impl Operation, params: Parameters) -> Self {
        Self::from_boxed(Box::new(op), params)
    }

    pub fn from_boxed(op: Box<dyn Operation>, params: Parameters) -> Self {
        Self {
            id: NodeId::next(),
            label: None,
            op,
            params,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Label if set, operation name otherwise.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or_else(|| self.op.name())
    }

    pub fn operation(&self) -> &dyn Operation {
        self.op.as_ref()
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn signature(&self) -> NodeSignature {
        NodeSignature {
            id: self.id,
            name: self.display_name().to_string(),
            operation: self.op.name().to_string(),
            inputs: self.op.inputs().to_vec(),
            output: self.op.output(),
        }
    }

    /// Assembly-time parameter check.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.op
            .validate(&self.params)
            .map_err(|source| ConfigurationError::InvalidParameter {
                op: self.op.name().to_string(),
                source,
            })
    }

    /// Run this node for one pass.
    ///
    /// 1. bail out with `Cancelled` if the pass is already cancelled,
    /// 2. resolve inputs from the pool in declared port order,
    /// 3. run the operation,
    /// 4. publish the result under `(id, "out")` unless cancelled meanwhile.
    pub fn execute(&self, ctx: &PassContext) -> Result<(), ExecutionError> {
        if ctx.cancel.is_cancelled() {
            debug!(
                node = %self.id,
                op = self.op.name(),
                pass_id = ctx.pass_id,
                "pass cancelled before node start; not running"
            );
            return Err(ExecutionError::Cancelled);
        }

        let inputs = self.resolve_inputs(ctx)?;

        let started = Instant::now();
        info!(
            node = %self.id,
            name = self.display_name(),
            op = self.op.name(),
            pass_id = ctx.pass_id,
            inputs = inputs.len(),
            "node started"
        );

        let value = self.op.compute(&inputs, &self.params, &ctx.cancel)?;

        let declared = self.op.output();
        if value.value_type() != declared {
            return Err(ExecutionError::OutputTypeMismatch {
                node: self.id,
                declared,
                actual: value.value_type(),
            });
        }

        if ctx.cancel.is_cancelled() {
            debug!(
                node = %self.id,
                pass_id = ctx.pass_id,
                "cancelled while computing; discarding output"
            );
            return Err(ExecutionError::Cancelled);
        }

        ctx.pool
            .set(self.id, OUTPUT_PORT, value)
            .map_err(ExecutionError::Publish)?;

        debug!(
            node = %self.id,
            pass_id = ctx.pass_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "node published output"
        );
        Ok(())
    }

    fn resolve_inputs(&self, ctx: &PassContext) -> Result<Inputs, ExecutionError> {
        if self.op.inputs().is_empty() {
            return Ok(Inputs::empty());
        }

        let bindings = ctx.graph.bindings(self.id);
        if bindings.len() != self.op.inputs().len() {
            return Err(ExecutionError::MissingInput {
                node: self.id,
                port: self
                    .op
                    .inputs()
                    .get(bindings.len())
                    .map(|p| p.name)
                    .unwrap_or_default()
                    .to_string(),
                producer: None,
            });
        }

        let mut entries = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let port = binding.port;
            let producer = binding.producer.ok_or_else(|| ExecutionError::MissingInput {
                node: self.id,
                port: port.name.to_string(),
                producer: None,
            })?;

            let value = ctx
                .pool
                .get_as(producer, OUTPUT_PORT, port.ty)
                .map_err(|err| match err {
                    PoolError::NotFound { .. } => ExecutionError::MissingInput {
                        node: self.id,
                        port: port.name.to_string(),
                        producer: Some(producer),
                    },
                    other => ExecutionError::TypeMismatch(other),
                })?;
            entries.push((port.name, value));
        }

        Ok(Inputs::new(entries))
    }
}

impl fmt::Debug for ExecutableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("op", &self.op.name())
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::OperationError;
    use crate::exec::operation::PortSpec;
    use crate::value::{Value, ValueType};

    /// Emits `value`, or the sum of its integer inputs.
    struct Sum {
        ports: Vec<PortSpec>,
        value: i64,
        calls: Arc<AtomicUsize>,
    }

    impl Sum {
        fn source(value: i64) -> Self {
            Self {
                ports: vec![],
                value,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn over(ports: &[&'static str]) -> Self {
            Self {
                ports: ports.iter().map(|p| PortSpec::new(p, ValueType::Int)).collect(),
                value: 0,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Operation for Sum {
        fn name(&self) -> &str {
            "sum"
        }

        fn inputs(&self) -> &[PortSpec] {
            &self.ports
        }

        fn output(&self) -> ValueType {
            ValueType::Int
        }

        fn compute(
            &self,
            inputs: &Inputs,
            _params: &Parameters,
            cancel: &CancellationSignal,
        ) -> Result<Value, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            cancel.check()?;
            if inputs.is_empty() {
                return Ok(Value::Int(self.value));
            }
            // Positional weighting makes port order observable.
            let mut total = 0;
            for i in 0..inputs.len() {
                total = total * 10 + inputs.get::<i64>(i)?;
            }
            Ok(Value::Int(total))
        }
    }

    struct Liar;

    impl Operation for Liar {
        fn name(&self) -> &str {
            "liar"
        }

        fn inputs(&self) -> &[PortSpec] {
            &[]
        }

        fn output(&self) -> ValueType {
            ValueType::Matrix
        }

        fn compute(
            &self,
            _inputs: &Inputs,
            _params: &Parameters,
            _cancel: &CancellationSignal,
        ) -> Result<Value, OperationError> {
            Ok(Value::Bool(true))
        }
    }

    fn context(graph: ExecutionGraph) -> PassContext {
        PassContext::new(
            1,
            Arc::new(graph),
            Arc::new(ResourcePool::new()),
            CancellationSignal::new(),
        )
    }

    #[test]
    fn source_node_publishes_under_output_port() {
        let node = ExecutableNode::new(Sum::source(4), Parameters::new());
        let mut graph = ExecutionGraph::new();
        graph.add_node(node.signature()).unwrap();
        let ctx = context(graph);

        node.execute(&ctx).unwrap();
        assert_eq!(ctx.pool.get::<i64>(node.id(), OUTPUT_PORT), Ok(4));
    }

    #[test]
    fn cancelled_before_start_touches_nothing() {
        let op = Sum::source(4);
        let calls = Arc::clone(&op.calls);
        let node = ExecutableNode::new(op, Parameters::new());
        let mut graph = ExecutionGraph::new();
        graph.add_node(node.signature()).unwrap();
        let ctx = context(graph);
        ctx.cancel.cancel();

        assert_eq!(node.execute(&ctx), Err(ExecutionError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(ctx.pool.is_empty());
    }

    #[test]
    fn inputs_are_presented_in_port_order() {
        let p1 = ExecutableNode::new(Sum::source(1), Parameters::new());
        let p2 = ExecutableNode::new(Sum::source(2), Parameters::new());
        let c = ExecutableNode::new(Sum::over(&["left", "right"]), Parameters::new());

        let mut graph = ExecutionGraph::new();
        for n in [&p1, &p2, &c] {
            graph.add_node(n.signature()).unwrap();
        }
        graph.add_edge(p2.id(), c.id(), Some("right")).unwrap();
        graph.add_edge(p1.id(), c.id(), Some("left")).unwrap();
        let ctx = context(graph);

        p2.execute(&ctx).unwrap();
        p1.execute(&ctx).unwrap();
        c.execute(&ctx).unwrap();
        assert_eq!(ctx.pool.get::<i64>(c.id(), OUTPUT_PORT), Ok(12));
    }

    #[test]
    fn unpublished_predecessor_is_missing_input() {
        let p = ExecutableNode::new(Sum::source(1), Parameters::new());
        let c = ExecutableNode::new(Sum::over(&["in"]), Parameters::new());
        let mut graph = ExecutionGraph::new();
        graph.add_node(p.signature()).unwrap();
        graph.add_node(c.signature()).unwrap();
        graph.add_edge(p.id(), c.id(), None).unwrap();
        let ctx = context(graph);

        assert_eq!(
            c.execute(&ctx),
            Err(ExecutionError::MissingInput {
                node: c.id(),
                port: "in".into(),
                producer: Some(p.id()),
            })
        );
        assert!(ctx.pool.is_empty());
    }

    #[test]
    fn wrongly_typed_pool_entry_is_a_type_mismatch() {
        let p = ExecutableNode::new(Sum::source(1), Parameters::new());
        let c = ExecutableNode::new(Sum::over(&["in"]), Parameters::new());
        let mut graph = ExecutionGraph::new();
        graph.add_node(p.signature()).unwrap();
        graph.add_node(c.signature()).unwrap();
        graph.add_edge(p.id(), c.id(), None).unwrap();
        let ctx = context(graph);

        // Someone other than the producer wrote the key: a usage defect.
        ctx.pool.set(p.id(), OUTPUT_PORT, "oops".to_string()).unwrap();
        assert!(matches!(
            c.execute(&ctx),
            Err(ExecutionError::TypeMismatch(PoolError::TypeMismatch {
                expected: ValueType::Int,
                actual: ValueType::Text,
                ..
            }))
        ));
    }

    #[test]
    fn output_must_match_declared_type() {
        let node = ExecutableNode::new(Liar, Parameters::new()).with_label("liar-1");
        let mut graph = ExecutionGraph::new();
        graph.add_node(node.signature()).unwrap();
        let ctx = context(graph);

        assert!(matches!(
            node.execute(&ctx),
            Err(ExecutionError::OutputTypeMismatch { .. })
        ));
        assert!(ctx.pool.is_empty());
        assert_eq!(node.display_name(), "liar-1");
        assert_eq!(node.signature().operation, "liar");
    }
}
