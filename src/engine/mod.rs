// src/engine/mod.rs

//! Pipeline orchestration.
//!
//! [`PipelineBuilder`] assembles nodes and edges; the resulting
//! [`Pipeline`] is structurally frozen and can run any number of passes.
//! Each pass gets a fresh resource pool and reports a [`PassOutcome`].

pub mod builder;
pub mod outcome;
pub mod pipeline;

pub use builder::PipelineBuilder;
pub use outcome::{NodeFailure, PassOutcome, PassReport};
pub use pipeline::Pipeline;
