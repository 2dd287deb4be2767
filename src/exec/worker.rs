// src/exec/worker.rs

//! Worker loop: pull ready tasks from the shared scheduler, run them, and
//! report outcomes until the plan finishes, stalls, or is cancelled.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::dag::{Dispatch, DispatchedTask, SharedScheduler};
use crate::exec::events::ExecutionEvent;
use crate::exec::task_runner::{RunContext, TaskOutcome, run_task};

pub(crate) async fn worker_loop(worker: usize, shared: Arc<SharedScheduler>, ctx: Arc<RunContext>) {
    debug!(run_id = ctx.run_id, worker, "worker started");

    loop {
        if ctx.cancel.is_cancelled() {
            debug!(run_id = ctx.run_id, worker, "cancellation observed; worker exiting");
            break;
        }

        // Register for change notifications before looking at the queue, so
        // a completion that lands in between is not missed.
        let changed = shared.changed().notified();
        tokio::pin!(changed);
        changed.as_mut().enable();

        match shared.next() {
            Dispatch::Run(task) => run_one(worker, &shared, &ctx, task).await,
            Dispatch::Wait => {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => {}
                    _ = &mut changed => {}
                    _ = tokio::time::sleep(ctx.config.poll_interval) => {}
                }
            }
            Dispatch::Finished => {
                debug!(run_id = ctx.run_id, worker, "all tasks terminal; worker exiting");
                break;
            }
            Dispatch::Stalled(stall) => {
                error!(
                    run_id = ctx.run_id,
                    worker,
                    completed = stall.completed,
                    total = stall.total,
                    remaining = ?stall.remaining,
                    "scheduler stalled; worker exiting"
                );
                shared.wake_all();
                break;
            }
        }
    }
}

async fn run_one(worker: usize, shared: &SharedScheduler, ctx: &RunContext, task: DispatchedTask) {
    let started = Instant::now();
    info!(
        run_id = ctx.run_id,
        worker,
        task = %task.id,
        capability = %task.capability,
        "task start"
    );
    ctx.events.emit(ExecutionEvent::TaskStarted {
        task: task.id.clone(),
        capability: task.capability.clone(),
        purpose: task.purpose.clone(),
        worker,
    });

    match run_task(&task, ctx).await {
        TaskOutcome::Completed(result) => match shared.complete(&task.id, result) {
            Ok(step) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                info!(
                    run_id = ctx.run_id,
                    worker,
                    task = %task.id,
                    elapsed_ms,
                    newly_ready = step.newly_ready.len(),
                    "task complete"
                );
                ctx.events.emit(ExecutionEvent::TaskCompleted {
                    task: task.id.clone(),
                    elapsed_ms,
                });
            }
            Err(err) => error!(run_id = ctx.run_id, task = %task.id, error = %err, "could not record completion"),
        },
        TaskOutcome::Failed(error) => match shared.fail(&task.id, error.clone()) {
            Ok(step) => {
                info!(
                    run_id = ctx.run_id,
                    worker,
                    task = %task.id,
                    error = %error,
                    skipped = step.newly_skipped.len(),
                    "task failed"
                );
                ctx.events.emit(ExecutionEvent::TaskFailed {
                    task: task.id.clone(),
                    error,
                });
                for skipped in step.newly_skipped {
                    ctx.events.emit(ExecutionEvent::TaskSkipped {
                        task: skipped,
                        failed_upstream: task.id.clone(),
                    });
                }
            }
            Err(err) => error!(run_id = ctx.run_id, task = %task.id, error = %err, "could not record failure"),
        },
        TaskOutcome::Abandoned => {
            info!(run_id = ctx.run_id, worker, task = %task.id, "task abandoned on cancellation");
            shared.wake_all();
        }
    }
}
