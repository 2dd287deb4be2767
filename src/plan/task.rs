// src/plan/task.rs

//! Task specifications and lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// One task as produced by the decomposition step.
///
/// ```json
/// { "id": "T3", "capability": "memo",
///   "input": "Summarize {{T1.result}} and {{T2.result}}",
///   "dependencies": ["T1", "T2"] }
/// ```
///
/// `agent` is accepted as an alias for `capability`, and `input_template`
/// for `input`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    /// Unique within a plan. Documents may omit it; the plan loader then
    /// assigns `t<N>` by position.
    #[serde(default)]
    pub id: TaskId,

    /// Selects which agent executes the task.
    #[serde(alias = "agent")]
    pub capability: String,

    /// Input template; may contain `{{<task_id>.result}}` placeholders.
    #[serde(alias = "input_template")]
    pub input: String,

    /// Free-form note on why the task exists. Carried into events and reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Tasks whose results this task may reference.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<TaskId>,
        capability: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            capability: capability.into(),
            input: input.into(),
            purpose: None,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<TaskId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// Lifecycle of a task within one execution.
///
/// `Pending -> Ready -> Running -> {Completed | Failed}`, plus
/// `Pending | Ready -> Skipped` when an ancestor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Ready.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
    }

    #[test]
    fn deserializes_agent_alias_and_defaults() {
        let spec: TaskSpec =
            serde_json::from_str(r#"{"agent": "memo", "input": "hello"}"#).unwrap();
        assert_eq!(spec.capability, "memo");
        assert!(spec.id.is_empty());
        assert!(spec.dependencies.is_empty());
        assert!(spec.purpose.is_none());
    }
}
