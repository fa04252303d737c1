// src/engine/pipeline.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::dag::{ExecutionGraph, NodeTable, PassRun, Scheduler};
use crate::engine::outcome::{NodeFailure, PassOutcome, PassReport};
use crate::errors::ExecutionError;
use crate::exec::{CancellationSignal, ExecutableNode, PassContext};
use crate::pool::ResourcePool;
use crate::types::{NodeId, SchedulerOptions};

/// A built, structurally frozen pipeline.
#[derive(Debug)]
pub struct Pipeline {
    graph: Arc<ExecutionGraph>,
    nodes: NodeTable,
    scheduler: Scheduler,
    passes: AtomicU64,
}

impl Pipeline {
    pub(crate) fn new(graph: ExecutionGraph, nodes: NodeTable, options: SchedulerOptions) -> Self {
        Self {
            graph: Arc::new(graph),
            nodes,
            scheduler: Scheduler::new(options),
            passes: AtomicU64::new(0),
        }
    }

    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    pub fn node(&self, id: NodeId) -> Option<&ExecutableNode> {
        self.nodes.get(&id).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn options(&self) -> SchedulerOptions {
        self.scheduler.options()
    }

    /// Number of passes started so far.
    pub fn passes_started(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Execute every node once against a fresh pool.
    ///
    /// Raising `cancel` stops dispatching and asks running nodes to stop at
    /// their next checkpoint; the call still waits for them before
    /// returning.
    pub async fn run_pass(&self, cancel: &CancellationSignal) -> PassOutcome {
        let pass_id = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        let pool = Arc::new(ResourcePool::new());
        let ctx = PassContext::new(
            pass_id,
            Arc::clone(&self.graph),
            Arc::clone(&pool),
            cancel.clone(),
        );

        let started = Instant::now();
        let run = self.scheduler.run(&self.nodes, ctx).await;
        let elapsed = started.elapsed();

        self.conclude(pass_id, run, pool, elapsed)
    }

    fn conclude(
        &self,
        pass_id: u64,
        run: PassRun,
        pool: Arc<ResourcePool>,
        elapsed: std::time::Duration,
    ) -> PassOutcome {
        let all_succeeded = run.all_succeeded();
        let mut failures = run
            .failures
            .into_iter()
            .map(|(id, error)| self.describe_failure(id, error));

        let primary = failures.next();
        let report = PassReport {
            pass_id,
            elapsed,
            states: run.states,
            pool,
            secondary: failures.collect(),
        };

        match primary {
            Some(failure) => {
                error!(
                    pass_id,
                    node = %failure.node,
                    name = %failure.name,
                    op = %failure.operation,
                    error = %failure.error,
                    secondary = report.secondary.len(),
                    "pass failed"
                );
                PassOutcome::Failed { failure, report }
            }
            None if all_succeeded => {
                info!(
                    pass_id,
                    nodes = report.states.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "pass completed"
                );
                PassOutcome::Completed(report)
            }
            None => {
                if !run.cancelled {
                    warn!(pass_id, "pass stopped early without a failure or caller cancellation");
                }
                info!(
                    pass_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "pass cancelled"
                );
                PassOutcome::Cancelled(report)
            }
        }
    }

    fn describe_failure(&self, node: NodeId, error: ExecutionError) -> NodeFailure {
        match self.nodes.get(&node) {
            Some(n) => NodeFailure {
                node,
                name: n.display_name().to_string(),
                operation: n.operation().name().to_string(),
                error,
            },
            None => NodeFailure {
                node,
                name: node.to_string(),
                operation: String::from("unknown"),
                error,
            },
        }
    }
}
