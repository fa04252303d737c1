// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ConfigurationError`]: graph assembly problems, raised before any pass.
//! - [`PoolError`]: resource pool lookups and writes.
//! - [`ParamError`] / [`OperationError`]: what an operation's compute step
//!   may return.
//! - [`ExecutionError`]: what a node execution reports to the scheduler.
//! - [`ImgdagError`]: loader / CLI level error wrapping the above.

use thiserror::Error;

use crate::types::NodeId;
use crate::value::ValueType;

/// Invalid pipeline structure. Only ever raised at assembly time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("node {0} is already registered")]
    DuplicateNode(NodeId),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {node} has no input port named '{port}'")]
    UnknownPort { node: NodeId, port: String },

    #[error("node {node} declares several input ports; the edge must name one")]
    AmbiguousPort { node: NodeId },

    #[error("node {node} is a source and takes no inputs")]
    NoInputPorts { node: NodeId },

    #[error("port '{port}' of node {consumer} is already bound to {existing}")]
    DuplicatePortBinding {
        consumer: NodeId,
        port: String,
        existing: NodeId,
    },

    #[error(
        "cannot bind {producer} ({produced}) to port '{port}' of {consumer} (expects {expected})"
    )]
    IncompatibleTypes {
        producer: NodeId,
        consumer: NodeId,
        port: String,
        produced: ValueType,
        expected: ValueType,
    },

    #[error("edge {producer} -> {consumer} would close a cycle")]
    CycleDetected { producer: NodeId, consumer: NodeId },

    #[error("input port '{port}' of node {node} has no producer")]
    UnboundPort { node: NodeId, port: String },

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("invalid parameter for {op}: {source}")]
    InvalidParameter {
        op: String,
        #[source]
        source: ParamError,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Resource pool failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error("no value published for {node}:{port}")]
    NotFound { node: NodeId, port: String },

    #[error("value at {node}:{port} is {actual}, requested {expected}")]
    TypeMismatch {
        node: NodeId,
        port: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("{node}:{port} was already assigned in this pass")]
    AlreadyAssigned { node: NodeId, port: String },
}

/// Parameter lookup failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("missing parameter '{0}'")]
    Missing(String),

    #[error("parameter '{key}' is {actual}, expected {expected}")]
    WrongType {
        key: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("parameter '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

/// Returned by an operation's compute step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("{0}")]
    Failed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Param(#[from] ParamError),
}

impl OperationError {
    pub fn failed(msg: impl Into<String>) -> Self {
        OperationError::Failed(msg.into())
    }
}

/// Outcome of a failed node execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("operation cancelled")]
    Cancelled,

    /// A predecessor's output was not in the pool when the node started.
    /// Always a scheduling or assembly defect.
    #[error("missing input for port '{port}' of {node}")]
    MissingInput {
        node: NodeId,
        port: String,
        producer: Option<NodeId>,
    },

    #[error(transparent)]
    TypeMismatch(PoolError),

    #[error("{node} produced {actual}, but declares {declared}")]
    OutputTypeMismatch {
        node: NodeId,
        declared: ValueType,
        actual: ValueType,
    },

    #[error("{0}")]
    OperationFailure(String),

    #[error("failed to publish output: {0}")]
    Publish(PoolError),

    #[error("node execution panicked: {0}")]
    Panicked(String),

    #[error("{0} is in the graph but has no executable")]
    MissingExecutable(NodeId),
}

impl ExecutionError {
    /// `true` for the cooperative abort, which is not a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }
}

impl From<OperationError> for ExecutionError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Cancelled => ExecutionError::Cancelled,
            OperationError::Failed(msg) => ExecutionError::OperationFailure(msg),
            OperationError::Param(p) => ExecutionError::OperationFailure(p.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ImgdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pipeline assembly error: {0}")]
    Graph(#[from] ConfigurationError),

    #[error("Pipeline assembly error in node '{name}': {source}")]
    Node {
        name: String,
        #[source]
        source: ConfigurationError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ImgdagError>;
