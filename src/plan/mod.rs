// src/plan/mod.rs

//! Task plans: the immutable DAG handed to the executor.
//!
//! - [`task`] defines the task specification and lifecycle states.
//! - [`graph`] holds the validated, arena-style [`TaskPlan`].
//! - [`validate`] rejects cycles, dangling and duplicate ids before any
//!   execution starts.
//! - [`loader`] reads decomposition documents (JSON or TOML) from disk.

pub mod graph;
pub mod loader;
pub mod task;
pub mod validate;

pub use graph::{NodeIndex, TaskPlan};
pub use loader::{PlanDocument, load_plan, load_plan_document, parse_plan_document};
pub use task::{TaskId, TaskSpec, TaskStatus};
