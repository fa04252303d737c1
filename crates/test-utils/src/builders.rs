use std::collections::BTreeMap;

use imgdag::config::{InputBinding, NodeConfig, PipelineFile, RawPipelineFile, RuntimeSection};

/// Builder for `PipelineFile` to simplify test setup.
pub struct PipelineFileBuilder {
    config: RawPipelineFile,
}

impl PipelineFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawPipelineFile {
                runtime: RuntimeSection::default(),
                node: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: NodeConfig) -> Self {
        self.config.node.insert(name.to_string(), node);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.runtime.max_concurrency = Some(n);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.runtime.timeout_ms = Some(ms);
        self
    }

    pub fn raw(self) -> RawPipelineFile {
        self.config
    }

    pub fn build(self) -> PipelineFile {
        PipelineFile::try_from(self.config).expect("Failed to build valid pipeline from builder")
    }
}

impl Default for PipelineFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new(op: &str) -> Self {
        Self {
            node: NodeConfig {
                op: op.to_string(),
                inputs: InputBinding::default(),
                params: toml::Table::new(),
            },
        }
    }

    /// Append a positional input.
    pub fn input(mut self, producer: &str) -> Self {
        match &mut self.node.inputs {
            InputBinding::Positional(list) => list.push(producer.to_string()),
            InputBinding::Named(_) => panic!("cannot mix positional and named inputs"),
        }
        self
    }

    /// Bind a named port.
    pub fn port(mut self, port: &str, producer: &str) -> Self {
        if matches!(&self.node.inputs, InputBinding::Positional(list) if list.is_empty()) {
            self.node.inputs = InputBinding::Named(BTreeMap::new());
        }
        match &mut self.node.inputs {
            InputBinding::Named(map) => {
                map.insert(port.to_string(), producer.to_string());
            }
            InputBinding::Positional(_) => panic!("cannot mix positional and named inputs"),
        }
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.node.params.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}
