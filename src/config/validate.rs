// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::{ImgdagError, Result};

const NODE_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_-]*$";

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = ImgdagError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(PipelineFile::new_unchecked(raw.runtime, raw.node))
    }
}

/// Structural checks that need no operation registry.
///
/// Operation kinds, port names and parameter types are checked later,
/// when the pipeline is assembled.
pub fn validate_config(cfg: &RawPipelineFile) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_runtime(cfg)?;
    validate_node_names(cfg)?;
    validate_references(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_nodes(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(ImgdagError::ConfigError(
            "pipeline must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_runtime(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.runtime.max_concurrency == Some(0) {
        return Err(ImgdagError::ConfigError(
            "[runtime].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.runtime.timeout_ms == Some(0) {
        return Err(ImgdagError::ConfigError(
            "[runtime].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_node_names(cfg: &RawPipelineFile) -> Result<()> {
    let pattern = Regex::new(NODE_NAME_PATTERN).map_err(anyhow::Error::from)?;
    for name in cfg.node.keys() {
        if !pattern.is_match(name) {
            return Err(ImgdagError::ConfigError(format!(
                "invalid node name '{name}' (letters, digits, '_' and '-', not starting with a digit)"
            )));
        }
    }
    Ok(())
}

fn validate_references(cfg: &RawPipelineFile) -> Result<()> {
    for (name, node) in cfg.node.iter() {
        if node.op.trim().is_empty() {
            return Err(ImgdagError::ConfigError(format!(
                "node '{name}' has an empty `op`"
            )));
        }
        for producer in node.inputs.producers() {
            if producer == name.as_str() {
                return Err(ImgdagError::ConfigError(format!(
                    "node '{name}' cannot take its own output as input"
                )));
            }
            if !cfg.node.contains_key(producer) {
                return Err(ImgdagError::ConfigError(format!(
                    "node '{name}' has unknown input '{producer}'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawPipelineFile) -> Result<()> {
    // Edge direction: producer -> consumer.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.node.keys() {
        graph.add_node(name.as_str());
    }
    for (name, node) in cfg.node.iter() {
        for producer in node.inputs.producers() {
            graph.add_edge(producer, name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(ImgdagError::ConfigError(format!(
            "cycle detected in pipeline involving node '{}'",
            cycle.node_id()
        ))),
    }
}
