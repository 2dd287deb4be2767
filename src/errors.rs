// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PlanError`]: a task list that can never run (reported before execution).
//! - [`SchedulerError`]: an outcome reported for a task the scheduler did not
//!   hand out.
//! - [`AgentError`]: a single agent invocation went wrong; recorded on the task.
//! - [`InjectionError`]: unresolved placeholders under the strict policy.
//! - [`PlandagError`]: everything that aborts a whole run.

use std::time::Duration;

use thiserror::Error;

use crate::plan::{TaskId, TaskStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("cyclic dependency between tasks: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<TaskId> },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("duplicate task id '{0}'")]
    DuplicateTaskId(TaskId),

    #[error("invalid task '{task}': {reason}")]
    InvalidTask { task: TaskId, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("unknown task '{0}'")]
    UnknownTask(TaskId),

    #[error("task '{task}' cannot move from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("no agent registered for capability '{0}'")]
    UnknownCapability(String),

    #[error("agent panicked: {0}")]
    Panicked(String),

    #[error("agent IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectionError {
    #[error("unresolved placeholders for tasks: {}", ids.join(", "))]
    Unresolved { ids: Vec<TaskId> },
}

#[derive(Error, Debug)]
pub enum PlandagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid plan: {0}")]
    Plan(#[from] PlanError),

    #[error("scheduler stalled with {completed}/{total} tasks terminal; stuck: {}", remaining.join(", "))]
    Stalled {
        completed: usize,
        total: usize,
        remaining: Vec<TaskId>,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlandagError>;
