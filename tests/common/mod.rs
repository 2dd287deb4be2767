#![allow(dead_code)]

pub use plandag_test_utils::{PlanBuilder, ScriptedAgent, init_tracing, task, with_timeout};

use plandag::exec::{AgentRegistry, Executor, ExecutorConfig};

/// An executor whose every capability is served by `agent`.
pub fn executor_with(agent: &ScriptedAgent, config: ExecutorConfig) -> Executor {
    Executor::new(AgentRegistry::new().with_fallback(agent.clone()), config)
}

/// Default config with `workers` workers and no per-task timeout.
pub fn config(workers: usize) -> ExecutorConfig {
    ExecutorConfig {
        max_parallel_tasks: workers,
        task_timeout: None,
        ..ExecutorConfig::default()
    }
}
