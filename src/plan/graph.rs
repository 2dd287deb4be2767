// src/plan/graph.rs

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::context::placeholder_ids;
use crate::errors::PlanError;
use crate::plan::task::{TaskId, TaskSpec};
use crate::plan::validate::validate_specs;

/// Position of a task inside its [`TaskPlan`].
pub type NodeIndex = usize;

/// Internal node structure: the task definition plus adjacency in both directions.
#[derive(Debug, Clone)]
struct PlanNode {
    spec: TaskSpec,
    /// Direct dependencies (deduplicated).
    deps: Vec<NodeIndex>,
    /// Direct dependents, in plan order.
    dependents: Vec<NodeIndex>,
    /// Task ids named by placeholders in the input template.
    references: Vec<TaskId>,
}

/// Immutable, validated task DAG.
///
/// Nodes live in a vector in the order they were supplied; that order is
/// also the order in which simultaneously-ready roots are seeded. The
/// topology never changes after construction, so a plan can be shared
/// between workers behind an `Arc` without synchronisation.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    nodes: Vec<PlanNode>,
    index: HashMap<TaskId, NodeIndex>,
}

impl TaskPlan {
    /// Validate a task list and build the plan.
    ///
    /// Fails with [`PlanError::CyclicDependency`] for cycles (including a
    /// task depending on itself) and [`PlanError::UnknownDependency`] for
    /// dangling references.
    pub fn new(specs: impl IntoIterator<Item = TaskSpec>) -> Result<Self, PlanError> {
        let mut specs: Vec<TaskSpec> = specs.into_iter().collect();
        for spec in specs.iter_mut() {
            dedup_in_order(&mut spec.dependencies);
        }

        validate_specs(&specs)?;

        let index: HashMap<TaskId, NodeIndex> = specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let mut nodes: Vec<PlanNode> = specs
            .into_iter()
            .map(|spec| {
                let references = placeholder_ids(&spec.input)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let deps = spec
                    .dependencies
                    .iter()
                    .filter_map(|d| index.get(d).copied())
                    .collect();
                PlanNode {
                    spec,
                    deps,
                    dependents: Vec::new(),
                    references,
                }
            })
            .collect();

        for i in 0..nodes.len() {
            let deps = nodes[i].deps.clone();
            for dep in deps {
                nodes[dep].dependents.push(i);
            }
        }

        let plan = Self { nodes, index };
        plan.warn_on_undeclared_references();
        debug!(tasks = plan.len(), roots = plan.roots().len(), "task plan built");
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All task specs, in plan order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.nodes.iter().map(|n| &n.spec)
    }

    pub fn task(&self, index: NodeIndex) -> &TaskSpec {
        &self.nodes[index].spec
    }

    pub fn get(&self, id: &str) -> Option<&TaskSpec> {
        self.index_of(id).map(|i| self.task(i))
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn dependencies_of(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.nodes[index].deps
    }

    pub fn dependents_of(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.nodes[index].dependents
    }

    /// Task ids referenced by `{{id.result}}` placeholders in the input.
    pub fn references_of(&self, index: NodeIndex) -> &[TaskId] {
        &self.nodes[index].references
    }

    /// Tasks without dependencies, in plan order.
    pub fn roots(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].deps.is_empty())
            .collect()
    }

    /// Initial in-degree of every task, indexed by [`NodeIndex`].
    pub fn initial_in_degree(&self) -> Vec<usize> {
        self.nodes.iter().map(|n| n.deps.len()).collect()
    }

    /// Group tasks into waves: wave `n` holds the tasks whose longest
    /// dependency chain has length `n`. Used for dry-run output.
    pub fn layers(&self) -> Vec<Vec<NodeIndex>> {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut in_degree = self.initial_in_degree();
        let mut queue: VecDeque<NodeIndex> = self.roots().into();

        while let Some(i) = queue.pop_front() {
            for &d in self.dependents_of(i) {
                depth[d] = depth[d].max(depth[i] + 1);
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    queue.push_back(d);
                }
            }
        }

        let max = depth.iter().copied().max().unwrap_or(0);
        let mut layers = vec![Vec::new(); if self.nodes.is_empty() { 0 } else { max + 1 }];
        for (i, d) in depth.into_iter().enumerate() {
            layers[d].push(i);
        }
        layers
    }

    /// A placeholder that names a task outside the dependency list may or
    /// may not be resolved depending on timing, so flag it early.
    fn warn_on_undeclared_references(&self) {
        for node in &self.nodes {
            for reference in &node.references {
                if !node.spec.dependencies.contains(reference) {
                    warn!(
                        task = %node.spec.id,
                        reference = %reference,
                        known = self.index.contains_key(reference),
                        "placeholder references a task that is not a declared dependency"
                    );
                }
            }
        }
    }
}

fn dedup_in_order(ids: &mut Vec<TaskId>) {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> TaskPlan {
        TaskPlan::new(vec![
            TaskSpec::new("A", "memo", "root"),
            TaskSpec::new("B", "memo", "b {{A.result}}").depends_on("A"),
            TaskSpec::new("C", "memo", "c").depends_on("A"),
            TaskSpec::new("D", "memo", "{{B.result}} {{C.result}}")
                .depends_on("B")
                .depends_on("C"),
        ])
        .unwrap()
    }

    #[test]
    fn adjacency_is_built_both_ways() {
        let plan = diamond();
        let a = plan.index_of("A").unwrap();
        let d = plan.index_of("D").unwrap();

        assert_eq!(plan.roots(), vec![a]);
        assert_eq!(plan.dependents_of(a).len(), 2);
        assert_eq!(plan.dependencies_of(d).len(), 2);
        assert_eq!(plan.initial_in_degree(), vec![0, 1, 1, 2]);
        assert_eq!(plan.references_of(d), &["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn duplicate_dependencies_count_once() {
        let plan = TaskPlan::new(vec![
            TaskSpec::new("A", "memo", "a"),
            TaskSpec::new("B", "memo", "b").depends_on("A").depends_on("A"),
        ])
        .unwrap();
        assert_eq!(plan.initial_in_degree(), vec![0, 1]);
        assert_eq!(plan.get("B").unwrap().dependencies, vec!["A".to_string()]);
    }

    #[test]
    fn layers_follow_longest_chain() {
        let plan = diamond();
        let names: Vec<Vec<&str>> = plan
            .layers()
            .iter()
            .map(|l| l.iter().map(|&i| plan.task(i).id.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["A"], vec!["B", "C"], vec!["D"]]);
    }

    #[test]
    fn empty_plan_is_valid() {
        let plan = TaskPlan::new(Vec::new()).unwrap();
        assert!(plan.is_empty());
        assert!(plan.layers().is_empty());
    }
}
