// src/config/mod.rs

//! Pipeline files.
//!
//! - [`model`]: the TOML-backed data model.
//! - [`loader`]: reading a file from disk.
//! - [`validate`]: structural checks (names, references, cycles).
//! - [`assemble`]: turning a validated file into a [`Pipeline`](crate::engine::Pipeline).

pub mod assemble;
pub mod loader;
pub mod model;
pub mod validate;

pub use assemble::{AssembledPipeline, assemble};
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{InputBinding, NodeConfig, PipelineFile, RawPipelineFile, RuntimeSection};
pub use validate::validate_config;
