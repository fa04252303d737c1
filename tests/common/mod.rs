#![allow(dead_code)]

pub use imgdag_test_utils::probes::{Behaviour, Probe, ProbeEvent, ProbeLog, Rendezvous};
pub use imgdag_test_utils::{init_tracing, with_timeout};

use imgdag::engine::{Pipeline, PipelineBuilder};
use imgdag::{ExecutableNode, NodeId, Operation, Parameters, SchedulerOptions};

/// Thin wrapper over `PipelineBuilder` for probe-based tests.
pub struct Harness {
    pub builder: PipelineBuilder,
    pub log: ProbeLog,
}

impl Harness {
    pub fn new(max_concurrency: usize) -> Self {
        init_tracing();
        Self {
            builder: PipelineBuilder::new()
                .options(SchedulerOptions::with_max_concurrency(max_concurrency)),
            log: ProbeLog::new(),
        }
    }

    pub fn node(&mut self, op: impl Operation) -> NodeId {
        self.builder
            .add_node(ExecutableNode::new(op, Parameters::new()))
            .expect("add node")
    }

    pub fn edge(&mut self, producer: NodeId, consumer: NodeId, port: Option<&str>) {
        self.builder
            .add_edge(producer, consumer, port)
            .expect("add edge");
    }

    pub fn build(self) -> (Pipeline, ProbeLog) {
        (self.builder.build().expect("build pipeline"), self.log)
    }
}
