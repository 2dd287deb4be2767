// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod report;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate, load_or_default};
use crate::exec::{ExecutionEvent, Executor};
use crate::plan::{TaskPlan, load_plan_document};
use crate::report::RunOutcome;

pub use crate::context::ContextInjector;
pub use crate::dag::DagScheduler;
pub use crate::errors::{PlandagError, Result as PlandagResult};
pub use crate::exec::{Agent, AgentRegistry, AgentRequest, ExecutorConfig, agent_fn};
pub use crate::plan::{TaskId, TaskSpec, TaskStatus};
pub use crate::report::ExecutionReport;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and shell agent registration
/// - plan loading and validation
/// - the executor
/// - Ctrl-C handling
///
/// Returns the run outcome, or `None` for `--dry-run`.
pub async fn run(args: CliArgs) -> Result<Option<RunOutcome>> {
    let cfg = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading config from '{path}'"))?,
        None => load_or_default(default_config_path())?,
    };

    let plan_path = PathBuf::from(&args.plan);
    let doc = load_plan_document(&plan_path)
        .with_context(|| format!("loading plan from '{}'", plan_path.display()))?;

    if args.dry_run {
        match doc.direct_response() {
            Some(response) => println!("plandag dry-run\ndirect response:\n{response}"),
            None => {
                let plan = TaskPlan::new(doc.into_specs())
                    .with_context(|| format!("validating plan '{}'", plan_path.display()))?;
                print_dry_run(&plan);
            }
        }
        return Ok(None);
    }

    let mut exec_config = cfg.executor_config();
    if let Some(workers) = args.workers {
        exec_config.max_parallel_tasks = workers;
    }
    if let Some(policy) = args.placeholder_policy {
        exec_config.placeholder_policy = policy.into();
    }

    let agents = cfg.agent_registry();
    if agents.is_empty() {
        warn!("no [agent.*] sections configured; every task will fail");
    }

    let mut executor = Executor::new(agents, exec_config);
    if args.events {
        executor = executor.with_events(spawn_event_printer());
    }

    // Ctrl-C → cooperative cancellation.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let report = executor
        .execute_document(doc, cancel)
        .await
        .with_context(|| format!("running plan '{}'", plan_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(Some(report.outcome))
}

/// Print each execution event to stderr as one JSON line.
fn spawn_event_printer() -> mpsc::Sender<ExecutionEvent> {
    let (tx, mut rx) = mpsc::channel::<ExecutionEvent>(256);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => eprintln!("{line}"),
                Err(e) => debug!(error = %e, "could not serialize event"),
            }
        }
    });
    tx
}

/// Dry-run output: the plan in dependency layers.
fn print_dry_run(plan: &TaskPlan) {
    println!("plandag dry-run");
    println!("tasks ({}):", plan.len());

    for (depth, layer) in plan.layers().iter().enumerate() {
        println!("  layer {depth}:");
        for &index in layer {
            let task = plan.task(index);
            println!("    - {} [{}]", task.id, task.capability);
            if let Some(purpose) = &task.purpose {
                println!("        purpose: {purpose}");
            }
            if !task.dependencies.is_empty() {
                println!("        after: {:?}", task.dependencies);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
