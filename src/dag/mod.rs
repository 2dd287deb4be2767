// src/dag/mod.rs

//! DAG scheduling.
//!
//! - [`scheduler`] contains the synchronous state machine that decides
//!   which tasks are ready, and propagates completion and failure.
//! - [`state_manager`] implements the readiness release and cascade-skip
//!   traversals over the plan arena.
//! - [`task_info`] provides per-task state and the dispatch record.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`shared`] wraps the scheduler for concurrent workers.

pub mod scheduler;
pub mod scheduler_step;
pub mod shared;
pub mod state_manager;
pub mod task_info;

pub use scheduler::{DagScheduler, Stall};
pub use scheduler_step::SchedulerStep;
pub use shared::{Dispatch, SharedScheduler};
pub use task_info::{DispatchedTask, TaskState};
