// src/exec/operation.rs

//! Operation contract.
//!
//! An [`Operation`] is the domain-specific part of a node: a synchronous
//! function of already-typed inputs, the node's parameters and the pass
//! cancellation signal. Everything around it (input resolution, type
//! checking, publishing) is done by [`ExecutableNode`](super::ExecutableNode),
//! so operations can be unit tested without a graph, a pool or a runtime.

use crate::errors::{OperationError, ParamError};
use crate::exec::cancel::CancellationSignal;
use crate::exec::params::Parameters;
use crate::types::DEFAULT_INPUT_PORT;
use crate::value::{Payload, Value, ValueType};

/// Static descriptor of one input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    pub ty: ValueType,
}

impl PortSpec {
    pub const fn new(name: &'static str, ty: ValueType) -> Self {
        Self { name, ty }
    }

    /// The implicit port of a single-input operation.
    pub const fn single(ty: ValueType) -> Self {
        Self::new(DEFAULT_INPUT_PORT, ty)
    }
}

/// Domain logic of a node.
pub trait Operation: Send + Sync + 'static {
    /// Human-readable operation name, used in logs and failure reports.
    fn name(&self) -> &str;

    /// Ordered input ports. Empty for source operations.
    fn inputs(&self) -> &[PortSpec];

    /// Type of the single published output.
    fn output(&self) -> ValueType;

    /// Assembly-time parameter check.
    fn validate(&self, _params: &Parameters) -> Result<(), ParamError> {
        Ok(())
    }

    /// Compute the output.
    ///
    /// Long-running implementations should call `cancel.check()?` at coarse
    /// checkpoints (per row, per phase).
    fn compute(
        &self,
        inputs: &Inputs,
        params: &Parameters,
        cancel: &CancellationSignal,
    ) -> Result<Value, OperationError>;
}

/// Resolved inputs of one execution, in declared port order.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    entries: Vec<(&'static str, Value)>,
}

impl Inputs {
    pub fn new(entries: Vec<(&'static str, Value)>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Single value under the default input port.
    pub fn single(value: impl Into<Value>) -> Self {
        Self::new(vec![(DEFAULT_INPUT_PORT, value.into())])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ports(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(p, _)| *p)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Positional typed access.
    pub fn get<T: Payload>(&self, index: usize) -> Result<T, OperationError> {
        let (port, value) = self
            .entries
            .get(index)
            .ok_or_else(|| OperationError::failed(format!("no input at position {index}")))?;
        Self::extract(port, value)
    }

    /// Typed access by port name.
    pub fn named<T: Payload>(&self, port: &str) -> Result<T, OperationError> {
        let (port, value) = self
            .entries
            .iter()
            .find(|(p, _)| *p == port)
            .ok_or_else(|| OperationError::failed(format!("no input on port '{port}'")))?;
        Self::extract(port, value)
    }

    fn extract<T: Payload>(port: &str, value: &Value) -> Result<T, OperationError> {
        T::from_value(value).ok_or_else(|| {
            OperationError::failed(format!(
                "input '{port}' is {}, expected {}",
                value.value_type(),
                T::TYPE
            ))
        })
    }
}
