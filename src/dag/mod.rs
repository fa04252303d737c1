// src/dag/mod.rs

//! Dependency graph and scheduling.
//!
//! - [`graph`] holds the typed, acyclic node graph.
//! - [`frontier`] is the per-pass readiness state machine.
//! - [`scheduler`] drives the frontier on Tokio, running nodes in parallel.

pub mod frontier;
pub mod graph;
pub mod scheduler;

pub use frontier::{Frontier, FrontierStep, NodeRunState};
pub use graph::{Binding, ExecutionGraph, NodeSignature};
pub use scheduler::{NodeTable, PassRun, Scheduler};
