// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod ops;
pub mod pool;
pub mod types;
pub mod value;

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, ExportTarget};
use crate::config::{AssembledPipeline, assemble, load_and_validate};
use crate::engine::{PassOutcome, PassReport, Pipeline};
use crate::exec::CancellationSignal;
use crate::ops::OperationRegistry;
use crate::types::OUTPUT_PORT;
use crate::value::Matrix;

pub use crate::dag::{ExecutionGraph, NodeRunState};
pub use crate::engine::{NodeFailure, PipelineBuilder};
pub use crate::exec::{ExecutableNode, Inputs, Operation, Parameters, PortSpec};
pub use crate::pool::ResourcePool;
pub use crate::types::{NodeId, SchedulerOptions};
pub use crate::value::{Value, ValueType};

/// How a CLI run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Failed => 1,
            RunStatus::Cancelled => 130,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading and assembly
/// - Ctrl-C and `[runtime].timeout_ms` cancellation
/// - the requested number of passes
/// - PGM export of the last pass
pub async fn run(args: CliArgs) -> Result<RunStatus> {
    let cfg = load_and_validate(&args.pipeline)
        .with_context(|| format!("loading {}", args.pipeline.display()))?;
    let assembled = assemble(&cfg, &OperationRegistry::builtin())?;

    if args.dry_run {
        print_dry_run(&assembled);
        return Ok(RunStatus::Completed);
    }

    // Ctrl-C cancels whatever pass is running.
    let cancel = CancellationSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling");
            cancel.cancel();
        });
    }

    let timeout = cfg.runtime().timeout();
    let mut last = None;
    for _ in 0..args.passes {
        match run_pass(&assembled.pipeline, &cancel, timeout).await {
            PassOutcome::Completed(report) => {
                println!(
                    "pass {} completed in {:.1?}: {} values, fingerprint {}",
                    report.pass_id(),
                    report.elapsed(),
                    report.pool().len(),
                    report.pool().fingerprint()
                );
                last = Some(report);
            }
            PassOutcome::Cancelled(report) => {
                eprintln!(
                    "imgdag: pass {} cancelled ({} of {} nodes finished)",
                    report.pass_id(),
                    report.count(NodeRunState::Succeeded),
                    assembled.pipeline.len()
                );
                return Ok(RunStatus::Cancelled);
            }
            PassOutcome::Failed { failure, report } => {
                eprintln!("imgdag: pass {} failed: {failure}", report.pass_id());
                for secondary in report.secondary_failures() {
                    eprintln!("imgdag:   also failed: {secondary}");
                }
                return Ok(RunStatus::Failed);
            }
        }
    }

    if let Some(report) = last {
        for target in &args.exports {
            export(&assembled, &report, target)?;
        }
    }

    Ok(RunStatus::Completed)
}

/// One pass under a child of `cancel` that is also raised when `timeout`
/// elapses.
async fn run_pass(
    pipeline: &Pipeline,
    cancel: &CancellationSignal,
    timeout: Option<Duration>,
) -> PassOutcome {
    let signal = cancel.child();
    let timer = timeout.map(|limit| {
        let signal = signal.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "pass timed out; cancelling");
                    signal.cancel();
                }
                _ = signal.cancelled() => {}
            }
        })
    });

    let outcome = pipeline.run_pass(&signal).await;
    if let Some(timer) = timer {
        timer.abort();
    }
    outcome
}

fn export(assembled: &AssembledPipeline, report: &PassReport, target: &ExportTarget) -> Result<()> {
    let id = assembled
        .id(&target.node)
        .ok_or_else(|| anyhow!("--export: unknown node '{}'", target.node))?;
    let image = report
        .pool()
        .get::<Matrix>(id, OUTPUT_PORT)
        .with_context(|| format!("--export: node '{}' has no image output", target.node))?;
    image.write_pgm(&target.path)?;
    info!(node = %target.node, path = %target.path.display(), "exported image");
    Ok(())
}

/// Print execution order and bindings without running anything.
fn print_dry_run(assembled: &AssembledPipeline) {
    let pipeline = &assembled.pipeline;
    let graph = pipeline.graph();
    let name = |id| assembled.name_of(id).unwrap_or("?");

    println!("imgdag dry-run");
    println!("  max_concurrency = {}", pipeline.options().max_concurrency);
    println!();
    println!("nodes ({}), in execution order:", pipeline.len());
    for id in graph.topological_order() {
        let Some(sig) = graph.signature(id) else { continue };
        println!("  - {} [{}] -> {}", name(id), sig.operation, sig.output);
        for binding in graph.bindings(id) {
            let producer = binding.producer.map(name).unwrap_or("<unbound>");
            println!("      {} ({}) <- {}", binding.port.name, binding.port.ty, producer);
        }
    }

    debug!("dry-run complete (no execution)");
}
