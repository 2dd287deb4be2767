// src/exec/task_runner.rs

//! Runs a single dispatched task: context injection, agent lookup, the
//! agent call itself under a timeout, and result capping.

use std::any::Any;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::ContextInjector;
use crate::dag::DispatchedTask;
use crate::errors::AgentError;
use crate::exec::agent::{AgentRegistry, AgentRequest};
use crate::exec::events::EventSink;
use crate::exec::executor::ExecutorConfig;

/// What a worker reports back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    Completed(String),
    Failed(String),
    /// The agent stopped because the run was cancelled. The task is left
    /// in its current state rather than recorded as a failure.
    Abandoned,
}

/// Everything a worker needs for one run, shared by all workers.
#[derive(Debug)]
pub(crate) struct RunContext {
    pub run_id: u64,
    pub agents: AgentRegistry,
    pub injector: ContextInjector,
    pub config: ExecutorConfig,
    pub events: EventSink,
    pub cancel: CancellationToken,
}

pub(crate) async fn run_task(task: &DispatchedTask, ctx: &RunContext) -> TaskOutcome {
    let input = match ctx.injector.resolve(&task.input_template, &task.upstream) {
        Ok(input) => input,
        Err(err) => return TaskOutcome::Failed(format!("context injection error: {err}")),
    };

    let Some(agent) = ctx.agents.resolve(&task.capability) else {
        return TaskOutcome::Failed(AgentError::UnknownCapability(task.capability.clone()).to_string());
    };

    let call_cancel = ctx.cancel.child_token();
    let request = AgentRequest {
        task_id: task.id.clone(),
        capability: task.capability.clone(),
        input,
        cancel: call_cancel.clone(),
    };

    // Spawned so that a panicking agent surfaces as a JoinError instead of
    // taking the worker down with it.
    let mut handle = tokio::spawn(async move { agent.execute(request).await });

    let joined = match ctx.config.timeout_for(&task.capability) {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                call_cancel.cancel();
                handle.abort();
                return TaskOutcome::Failed(AgentError::Timeout(limit).to_string());
            }
        },
        None => (&mut handle).await,
    };

    match joined {
        Ok(Ok(result)) => TaskOutcome::Completed(cap_result(&task.id, result, ctx.config.max_result_bytes)),
        Ok(Err(AgentError::Cancelled)) if ctx.cancel.is_cancelled() => {
            debug!(task = %task.id, "agent stopped for run cancellation");
            TaskOutcome::Abandoned
        }
        Ok(Err(err)) => TaskOutcome::Failed(err.to_string()),
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            TaskOutcome::Failed(AgentError::Panicked(message).to_string())
        }
        Err(join_err) => TaskOutcome::Failed(format!("agent call aborted: {join_err}")),
    }
}

/// Truncate `result` to at most `max_bytes`, on a char boundary.
fn cap_result(task: &str, mut result: String, max_bytes: usize) -> String {
    if result.len() <= max_bytes {
        return result;
    }
    let original = result.len();
    let mut end = max_bytes;
    while !result.is_char_boundary(end) {
        end -= 1;
    }
    result.truncate(end);
    warn!(
        task = %task,
        original_bytes = original,
        kept_bytes = end,
        "agent result exceeds size limit; truncated"
    );
    result
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// `Some(d)` unless `d` is zero, which means "no limit".
pub(crate) fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}
