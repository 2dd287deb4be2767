// src/exec/mod.rs

//! Execution layer.
//!
//! This module runs a validated plan against a set of agents with a
//! bounded pool of tokio workers, and reports back a per-task outcome.
//!
//! - [`agent`] defines the `Agent` trait and the capability registry.
//! - [`shell`] provides `ShellAgent`, which runs a command per task.
//! - [`task_runner`] runs one dispatched task (injection, timeout, capping).
//! - [`worker`] owns the loop each worker runs against the shared scheduler.
//! - [`executor`] wires scheduler, workers, cancellation and reporting.
//! - [`events`] defines the optional progress event stream.

pub mod agent;
pub mod events;
pub mod executor;
pub mod shell;
mod task_runner;
mod worker;

pub use agent::{Agent, AgentFuture, AgentRegistry, AgentRequest, FnAgent, agent_fn};
pub use events::{EventSink, ExecutionEvent};
pub use executor::{DEFAULT_MAX_RESULT_BYTES, Executor, ExecutorConfig};
pub use shell::ShellAgent;
