// src/plan/validate.rs

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::errors::PlanError;
use crate::plan::task::TaskSpec;

/// Construction-time checks for a task list.
///
/// Rejects, in this order: missing ids or capabilities, duplicate ids,
/// dependencies on unknown tasks, self-dependencies, and cycles.
pub(crate) fn validate_specs(specs: &[TaskSpec]) -> Result<(), PlanError> {
    ensure_task_fields(specs)?;
    ensure_unique_ids(specs)?;
    validate_task_dependencies(specs)?;
    validate_dag(specs)?;
    Ok(())
}

fn ensure_task_fields(specs: &[TaskSpec]) -> Result<(), PlanError> {
    for (position, spec) in specs.iter().enumerate() {
        if spec.id.trim().is_empty() {
            return Err(PlanError::InvalidTask {
                task: format!("#{}", position + 1),
                reason: "task id cannot be empty".to_string(),
            });
        }
        if spec.capability.trim().is_empty() {
            return Err(PlanError::InvalidTask {
                task: spec.id.clone(),
                reason: "capability cannot be empty".to_string(),
            });
        }
    }
    Ok(())
}

fn ensure_unique_ids(specs: &[TaskSpec]) -> Result<(), PlanError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.id.as_str()) {
            return Err(PlanError::DuplicateTaskId(spec.id.clone()));
        }
    }
    Ok(())
}

fn validate_task_dependencies(specs: &[TaskSpec]) -> Result<(), PlanError> {
    let known: HashSet<&str> = specs.iter().map(|s| s.id.as_str()).collect();

    for spec in specs {
        for dep in &spec.dependencies {
            if !known.contains(dep.as_str()) {
                return Err(PlanError::UnknownDependency {
                    task: spec.id.clone(),
                    dependency: dep.clone(),
                });
            }
            if dep == &spec.id {
                return Err(PlanError::CyclicDependency {
                    cycle: vec![spec.id.clone(), spec.id.clone()],
                });
            }
        }
    }
    Ok(())
}

fn validate_dag(specs: &[TaskSpec]) -> Result<(), PlanError> {
    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for spec in specs {
        graph.add_node(spec.id.as_str());
    }
    for spec in specs {
        for dep in &spec.dependencies {
            graph.add_edge(dep.as_str(), spec.id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PlanError::CyclicDependency {
            cycle: describe_cycle(&graph, cycle.node_id()),
        }),
    }
}

/// Recover one concrete cycle (`[a, b, ..., a]`) through the strongly
/// connected component that contains `start`.
fn describe_cycle(graph: &DiGraphMap<&str, ()>, start: &str) -> Vec<String> {
    let components = kosaraju_scc(graph);
    let component = components
        .iter()
        .find(|c| c.len() > 1 && c.contains(&start))
        .or_else(|| components.iter().find(|c| c.len() > 1));

    let Some(component) = component else {
        return vec![start.to_string()];
    };
    let start = if component.contains(&start) {
        start
    } else {
        component[0]
    };
    let members: HashSet<&str> = component.iter().copied().collect();

    // BFS inside the component until an edge leads back to `start`.
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut closing = None;

    'search: while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if !members.contains(next) {
                continue;
            }
            if next == start {
                closing = Some(node);
                break 'search;
            }
            if next != node && !parent.contains_key(next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    let Some(mut node) = closing else {
        return component.iter().map(|s| s.to_string()).collect();
    };

    let mut path = vec![start.to_string()];
    let mut back = vec![node.to_string()];
    while node != start {
        match parent.get(node) {
            Some(&prev) => {
                if prev != start {
                    back.push(prev.to_string());
                }
                node = prev;
            }
            None => break,
        }
    }
    back.reverse();
    path.extend(back);
    path.push(start.to_string());
    path
}
