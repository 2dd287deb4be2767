#![allow(dead_code)]

use plandag::errors::PlanError;
use plandag::plan::{TaskPlan, TaskSpec};

/// Shorthand for a task without dependencies.
pub fn task(id: &str, capability: &str, input: &str) -> TaskSpec {
    TaskSpec::new(id, capability, input)
}

/// Builder for `TaskPlan` to simplify test setup.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    specs: Vec<TaskSpec>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, id: &str, capability: &str, input: &str) -> Self {
        self.specs.push(task(id, capability, input));
        self
    }

    /// Add a task that depends on every id in `after`.
    pub fn task_after(mut self, id: &str, capability: &str, input: &str, after: &[&str]) -> Self {
        let spec = after
            .iter()
            .fold(task(id, capability, input), |spec, dep| spec.depends_on(*dep));
        self.specs.push(spec);
        self
    }

    pub fn with_spec(mut self, spec: TaskSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn specs(&self) -> Vec<TaskSpec> {
        self.specs.clone()
    }

    pub fn try_build(self) -> Result<TaskPlan, PlanError> {
        TaskPlan::new(self.specs)
    }

    pub fn build(self) -> TaskPlan {
        self.try_build().expect("Failed to build valid plan from builder")
    }
}
