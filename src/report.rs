// src/report.rs

//! Final per-task results of a run.

use std::time::Duration;

use serde::Serialize;

use crate::dag::DagScheduler;
use crate::plan::{TaskId, TaskStatus};
use crate::types::CancelReason;

/// Separator between task outputs in [`ExecutionReport::combined_output`].
pub const OUTPUT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every task completed.
    Completed,
    /// Every task is terminal and at least one failed (or was skipped).
    Failed,
    /// The run stopped early; some tasks are not terminal.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub capability: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl TaskReport {
    /// The result if the task completed, otherwise its error.
    pub fn output(&self) -> Option<&str> {
        self.result.as_deref().or(self.error.as_deref())
    }
}

/// Outcome of one `Executor::execute` call. Tasks appear in plan order.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_id: u64,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
    pub elapsed_ms: u64,
    /// The planner's own answer when the document asked for no execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_response: Option<String>,
    pub tasks: Vec<TaskReport>,
}

impl ExecutionReport {
    /// Snapshot the scheduler's final state.
    ///
    /// `cancel_reason` is only kept when the run actually stopped short;
    /// a cancellation that arrives after the last task finished does not
    /// change the outcome.
    pub fn from_scheduler(
        run_id: u64,
        scheduler: &DagScheduler,
        cancel_reason: Option<CancelReason>,
        elapsed: Duration,
    ) -> Self {
        let plan = scheduler.plan();
        let tasks: Vec<TaskReport> = plan
            .tasks()
            .zip(scheduler.states())
            .map(|(spec, state)| TaskReport {
                id: spec.id.clone(),
                capability: spec.capability.clone(),
                purpose: spec.purpose.clone(),
                status: state.status,
                result: state.result.as_deref().map(str::to_string),
                error: state.error.clone(),
            })
            .collect();

        let (outcome, cancel_reason) = if !scheduler.is_finished() && cancel_reason.is_some() {
            (RunOutcome::Cancelled, cancel_reason)
        } else if tasks.iter().any(|t| t.status != TaskStatus::Completed) {
            (RunOutcome::Failed, None)
        } else {
            (RunOutcome::Completed, None)
        };

        Self {
            run_id,
            outcome,
            cancel_reason,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            direct_response: None,
            tasks,
        }
    }

    /// A completed run that executed nothing and answers with `response`.
    pub fn direct(run_id: u64, response: impl Into<String>) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::Completed,
            cancel_reason: None,
            elapsed_ms: 0,
            direct_response: Some(response.into()),
            tasks: Vec::new(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn result_of(&self, id: &str) -> Option<&str> {
        self.task(id).and_then(|t| t.result.as_deref())
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// One `"Task <id>: <error>"` line per failed or skipped task.
    pub fn errors(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter_map(|t| t.error.as_ref().map(|e| format!("Task {}: {}", t.id, e)))
            .collect()
    }

    /// Completed results in plan order, joined by [`OUTPUT_SEPARATOR`].
    /// A direct response is returned as is. `None` when no task produced a
    /// result.
    pub fn combined_output(&self) -> Option<String> {
        if let Some(response) = &self.direct_response {
            return Some(response.clone());
        }
        let parts: Vec<&str> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .filter_map(|t| t.result.as_deref())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(OUTPUT_SEPARATOR))
        }
    }
}
