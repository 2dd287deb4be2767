// src/plan/loader.rs

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::Result;
use crate::plan::graph::TaskPlan;
use crate::plan::task::TaskSpec;

/// A decomposition document as written by the planning step.
///
/// Either a bare list of tasks, or an object carrying the planner's
/// analysis next to the task list:
///
/// ```json
/// { "analysis": "user wants a digest", "tasks": [ ... ] }
/// ```
///
/// When the planner answered the request itself it sets
/// `"direct_response": true` and puts the answer in `response`; the tasks
/// are then not run.
///
/// TOML documents use the object form with `[[tasks]]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanDocument {
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    tasks: Vec<TaskSpec>,
    #[serde(default)]
    direct_response: bool,
    #[serde(default)]
    response: Option<String>,
}

impl PlanDocument {
    /// A document holding only `tasks`.
    pub fn from_tasks(tasks: Vec<TaskSpec>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    /// The planner's own answer, when it flagged one and it is non-empty.
    pub fn direct_response(&self) -> Option<&str> {
        self.response
            .as_deref()
            .filter(|r| self.direct_response && !r.is_empty())
    }

    /// Task specs with missing ids filled in as `t<N>` (1-based position).
    pub fn into_specs(self) -> Vec<TaskSpec> {
        let mut specs = self.tasks;
        for (i, spec) in specs.iter_mut().enumerate() {
            if spec.id.trim().is_empty() {
                spec.id = format!("t{}", i + 1);
                debug!(task = %spec.id, "assigned positional id to task without id");
            }
        }
        specs
    }
}

/// Parse a decomposition document. `toml` selects the TOML syntax,
/// otherwise JSON is expected.
///
/// JSON is decoded in two steps (array or object first, then the matching
/// shape) so that a bad task field is reported by name.
pub fn parse_plan_document(contents: &str, toml: bool) -> Result<PlanDocument> {
    if toml {
        return Ok(toml::from_str(contents)?);
    }

    let value: serde_json::Value = serde_json::from_str(contents)?;
    let doc = if value.is_array() {
        PlanDocument::from_tasks(serde_json::from_value(value)?)
    } else {
        serde_json::from_value(value)?
    };
    Ok(doc)
}

/// Read a decomposition document from disk.
///
/// Files ending in `.toml` are parsed as TOML, everything else as JSON.
pub fn load_plan_document(path: impl AsRef<Path>) -> Result<PlanDocument> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let doc = parse_plan_document(&contents, is_toml)?;
    if let Some(analysis) = doc.analysis() {
        info!(%analysis, "loaded plan analysis");
    }
    Ok(doc)
}

/// Read a decomposition document from disk and build a validated plan.
pub fn load_plan(path: impl AsRef<Path>) -> Result<TaskPlan> {
    let doc = load_plan_document(path)?;
    let plan = TaskPlan::new(doc.into_specs())?;
    Ok(plan)
}
