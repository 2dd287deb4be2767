// src/dag/task_info.rs

//! Per-task mutable state and the hand-off record given to workers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::plan::{NodeIndex, TaskId, TaskStatus};

/// Mutable state of one task during an execution.
///
/// `result` is written once, on the transition into `Completed`; `error`
/// is written once, on the transition into `Failed` or `Skipped`.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub status: TaskStatus,
    pub result: Option<Arc<str>>,
    pub error: Option<String>,
}

impl TaskState {
    pub(crate) fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// Description of a task that the scheduler wants a worker to run now.
///
/// `upstream` carries the results of every completed task that the input
/// template references, captured in the same critical section that marked
/// the task `Running`. Workers never need to touch scheduler state to
/// resolve placeholders.
#[derive(Debug, Clone)]
pub struct DispatchedTask {
    pub index: NodeIndex,
    pub id: TaskId,
    pub capability: String,
    pub input_template: String,
    pub purpose: Option<String>,
    pub upstream: HashMap<TaskId, Arc<str>>,
}
