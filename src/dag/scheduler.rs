// src/dag/scheduler.rs

//! Async shell around [`Frontier`].
//!
//! The frontier decides *what* may run; this module decides *where*: each
//! ready node becomes a unit of work on a [`JoinSet`], gated by a semaphore
//! and executed on Tokio's blocking pool. Completions are fed back into the
//! frontier, which releases the next wave.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::frontier::{Frontier, NodeRunState};
use crate::errors::ExecutionError;
use crate::exec::{CancellationSignal, ExecutableNode, PassContext};
use crate::types::{NodeId, SchedulerOptions};

/// Node table shared between the pipeline and the units of work.
pub type NodeTable = HashMap<NodeId, Arc<ExecutableNode>>;

type UnitResult = (NodeId, Result<(), ExecutionError>);

/// Task id to node, so a unit that dies still reports against its node.
type Spawned = HashMap<task::Id, NodeId>;

/// What the scheduler observed during one pass.
#[derive(Debug, Default)]
pub struct PassRun {
    pub states: HashMap<NodeId, NodeRunState>,
    /// Non-cancellation failures in completion order; the first one halted
    /// the pass.
    pub failures: Vec<(NodeId, ExecutionError)>,
    /// The caller's signal was raised before the pass finished.
    pub cancelled: bool,
}

impl PassRun {
    pub fn all_succeeded(&self) -> bool {
        self.states
            .values()
            .all(|s| *s == NodeRunState::Succeeded)
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    /// Drive one pass to its end.
    ///
    /// `ctx.cancel` is the caller's signal; the pass runs under a child of
    /// it so a failure can stop in-flight siblings without raising the
    /// caller's signal. Every dispatched unit is joined before returning.
    pub async fn run(&self, nodes: &NodeTable, ctx: PassContext) -> PassRun {
        let caller = ctx.cancel.clone();
        let signal = caller.child();
        let ctx = PassContext {
            cancel: signal.clone(),
            ..ctx
        };

        let mut frontier = Frontier::new(&ctx.graph);
        let mut run = PassRun::default();

        if signal.is_cancelled() {
            info!(pass_id = ctx.pass_id, "pass cancelled before start");
            run.cancelled = true;
            run.states = frontier.into_states();
            return run;
        }

        info!(
            pass_id = ctx.pass_id,
            nodes = nodes.len(),
            max_concurrency = self.options.max_concurrency,
            "pass started"
        );

        let permits = Arc::new(Semaphore::new(self.options.max_concurrency));
        let mut units: JoinSet<UnitResult> = JoinSet::new();
        let mut spawned = Spawned::new();
        let mut halted = false;

        let ready = frontier.take_ready();
        self.dispatch(ready, nodes, &ctx, &permits, &mut frontier, &mut units, &mut spawned);

        while !units.is_empty() {
            tokio::select! {
                joined = units.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    let Some((id, result)) = settle(joined, &mut spawned) else {
                        error!(pass_id = ctx.pass_id, "unit of work aborted outside any node");
                        halted = true;
                        frontier.clear_ready();
                        signal.cancel();
                        continue;
                    };

                    match result {
                        Ok(()) => {
                            let step = frontier.complete(id);
                            debug!(
                                pass_id = ctx.pass_id,
                                node = %id,
                                newly_ready = step.newly_ready.len(),
                                "node succeeded"
                            );
                            if !halted {
                                let ready = frontier.take_ready();
                                self.dispatch(
                                    ready,
                                    nodes,
                                    &ctx,
                                    &permits,
                                    &mut frontier,
                                    &mut units,
                                    &mut spawned,
                                );
                            }
                        }
                        Err(err) if err.is_cancellation() => {
                            debug!(pass_id = ctx.pass_id, node = %id, "node cancelled");
                            frontier.cancel(id);
                        }
                        Err(err) => {
                            frontier.fail(id);
                            if halted {
                                warn!(
                                    pass_id = ctx.pass_id,
                                    node = %id,
                                    error = %err,
                                    "secondary failure while pass was halting"
                                );
                            } else {
                                error!(
                                    pass_id = ctx.pass_id,
                                    node = %id,
                                    error = %err,
                                    in_flight = units.len(),
                                    "node failed; halting pass"
                                );
                                halted = true;
                                frontier.clear_ready();
                                signal.cancel();
                            }
                            run.failures.push((id, err));
                        }
                    }
                }
                _ = signal.cancelled(), if !halted => {
                    info!(
                        pass_id = ctx.pass_id,
                        in_flight = units.len(),
                        "cancellation requested; waiting for in-flight nodes"
                    );
                    halted = true;
                    frontier.clear_ready();
                }
            }
        }

        run.cancelled = caller.is_cancelled();
        run.states = frontier.into_states();
        run
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        ready: Vec<NodeId>,
        nodes: &NodeTable,
        ctx: &PassContext,
        permits: &Arc<Semaphore>,
        frontier: &mut Frontier,
        units: &mut JoinSet<UnitResult>,
        spawned: &mut Spawned,
    ) {
        for id in ready {
            frontier.mark_running(id);

            let Some(node) = nodes.get(&id) else {
                // The graph and the node table are built together; a miss
                // is a pipeline construction bug. It fails like any node.
                error!(pass_id = ctx.pass_id, node = %id, "ready node has no executable");
                let handle =
                    units.spawn(async move { (id, Err(ExecutionError::MissingExecutable(id))) });
                spawned.insert(handle.id(), id);
                continue;
            };

            debug!(
                pass_id = ctx.pass_id,
                node = %id,
                name = node.display_name(),
                "dispatching node"
            );

            let node = Arc::clone(node);
            let ctx = ctx.clone();
            let permits = Arc::clone(permits);
            let handle = units.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (id, Err(ExecutionError::Cancelled)),
                };
                let result = tokio::task::spawn_blocking(move || node.execute(&ctx))
                    .await
                    .unwrap_or_else(|err| Err(panicked(err)));
                (id, result)
            });
            spawned.insert(handle.id(), id);
        }
    }
}

/// Pair a joined unit with its node, whether it returned or died.
fn settle(
    joined: Result<(task::Id, UnitResult), JoinError>,
    spawned: &mut Spawned,
) -> Option<UnitResult> {
    match joined {
        Ok((task, unit)) => {
            spawned.remove(&task);
            Some(unit)
        }
        Err(err) => {
            let id = spawned.remove(&err.id())?;
            Some((id, Err(panicked(err))))
        }
    }
}

fn panicked(err: JoinError) -> ExecutionError {
    if !err.is_panic() {
        return ExecutionError::Cancelled;
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    ExecutionError::Panicked(message)
}
