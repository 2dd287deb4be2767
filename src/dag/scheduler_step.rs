// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::plan::TaskId;

/// Structured result of a single scheduler operation.
///
/// Workers use it to emit events; tests use it to make assertions about
/// what changed when stepping the DAG by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step, in the
    /// order they were enqueued.
    pub newly_ready: Vec<TaskId>,
    /// Tasks that were newly marked as skipped because an ancestor failed.
    pub newly_skipped: Vec<TaskId>,
    /// Whether this step left every task in a terminal state.
    pub plan_finished: bool,
}
