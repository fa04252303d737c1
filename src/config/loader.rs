// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::Result;

/// Read and deserialize a pipeline file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw: RawPipelineFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), nodes = raw.node.len(), "pipeline file parsed");
    Ok(raw)
}

/// Read, deserialize and validate a pipeline file.
///
/// Checks node names, input references, runtime settings and acyclicity.
/// Operation kinds and parameters are checked by
/// [`assemble`](crate::config::assemble::assemble).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let raw = load_from_path(&path)?;
    PipelineFile::try_from(raw)
}

/// `Pipeline.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Pipeline.toml")
}
