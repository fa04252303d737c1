// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::SchedulerOptions;

/// Pipeline description as read from a TOML file.
///
/// ```toml
/// [runtime]
/// max_concurrency = 4
/// timeout_ms = 5000
///
/// [node.src]
/// op = "image.synthetic"
/// [node.src.params]
/// rows = 64
/// cols = 64
///
/// [node.blur]
/// op = "image.gaussian_blur"
/// inputs = ["src"]
/// [node.blur.params]
/// kernel_size = 5
/// sigma = 1.4
/// ```
///
/// Deserialized as-is; [`PipelineFile`] is the validated form.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// All nodes from `[node.<name>]`, keyed by name.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// Validated pipeline description.
///
/// Only obtainable through `TryFrom<RawPipelineFile>` (see `validate.rs`),
/// so holding one means names, references and acyclicity were checked.
#[derive(Debug, Clone)]
pub struct PipelineFile {
    runtime: RuntimeSection,
    node: BTreeMap<String, NodeConfig>,
}

impl PipelineFile {
    pub(crate) fn new_unchecked(runtime: RuntimeSection, node: BTreeMap<String, NodeConfig>) -> Self {
        Self { runtime, node }
    }

    pub fn runtime(&self) -> &RuntimeSection {
        &self.runtime
    }

    /// Nodes in name order.
    pub fn nodes(&self) -> &BTreeMap<String, NodeConfig> {
        &self.node
    }

    pub fn node(&self, name: &str) -> Option<&NodeConfig> {
        self.node.get(name)
    }
}

/// `[runtime]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Defaults to the machine's available parallelism.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Cancel a pass that runs longer than this.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RuntimeSection {
    pub fn scheduler_options(&self) -> SchedulerOptions {
        match self.max_concurrency {
            Some(n) => SchedulerOptions::with_max_concurrency(n),
            None => SchedulerOptions::default(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Operation kind, e.g. `"image.threshold"`.
    pub op: String,

    #[serde(default)]
    pub inputs: InputBinding,

    /// Operation parameters; converted to typed values at assembly.
    #[serde(default)]
    pub params: toml::Table,
}

/// How a node's input ports are fed.
///
/// - `inputs = ["a", "b"]` binds producers to ports in declared order.
/// - `inputs = { left = "a", right = "b" }` binds by port name.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InputBinding {
    Positional(Vec<String>),
    Named(BTreeMap<String, String>),
}

impl Default for InputBinding {
    fn default() -> Self {
        InputBinding::Positional(Vec::new())
    }
}

impl InputBinding {
    /// Referenced producer names, in binding order.
    pub fn producers(&self) -> Vec<&str> {
        match self {
            InputBinding::Positional(names) => names.iter().map(String::as_str).collect(),
            InputBinding::Named(ports) => ports.values().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            InputBinding::Positional(names) => names.is_empty(),
            InputBinding::Named(ports) => ports.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_input_spellings_parse() {
        let raw: RawPipelineFile = toml::from_str(
            r#"
            [node.a]
            op = "geometry.line"

            [node.b]
            op = "geometry.line"

            [node.x]
            op = "geometry.intersect_lines"
            inputs = { left = "a", right = "b" }

            [node.y]
            op = "geometry.intersect_lines"
            inputs = ["b", "a"]
            "#,
        )
        .unwrap();

        assert_eq!(raw.node["x"].inputs.producers(), vec!["a", "b"]);
        assert_eq!(raw.node["y"].inputs.producers(), vec!["b", "a"]);
        assert!(raw.node["a"].inputs.is_empty());
        assert_eq!(raw.runtime, RuntimeSection::default());
    }

    #[test]
    fn runtime_section_maps_to_options() {
        let raw: RawPipelineFile = toml::from_str(
            r#"
            [runtime]
            max_concurrency = 3
            timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(raw.runtime.scheduler_options().max_concurrency, 3);
        assert_eq!(raw.runtime.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn unknown_node_keys_are_rejected() {
        let res: Result<RawPipelineFile, _> = toml::from_str(
            r#"
            [node.a]
            op = "geometry.point"
            after = ["b"]
            "#,
        );
        assert!(res.is_err());
    }
}
