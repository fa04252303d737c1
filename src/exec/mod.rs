// src/exec/mod.rs

//! Node execution layer.
//!
//! - [`operation`] defines the [`Operation`] trait implemented by concrete
//!   processing steps, plus the port and input types they see.
//! - [`node`] wraps an operation into an [`ExecutableNode`] whose
//!   `execute` does the generic pool plumbing around the compute step.
//! - [`cancel`] provides the pass-wide [`CancellationSignal`].
//! - [`params`] holds the read-only [`Parameters`] map.

pub mod cancel;
pub mod node;
pub mod operation;
pub mod params;

pub use cancel::CancellationSignal;
pub use node::{ExecutableNode, PassContext};
pub use operation::{Inputs, Operation, PortSpec};
pub use params::Parameters;
