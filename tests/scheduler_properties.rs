mod common;
use crate::common::PlanBuilder;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use proptest::prelude::*;
use plandag::dag::DagScheduler;
use plandag::plan::{TaskPlan, TaskStatus};

// Strategy to generate a valid plan.
// We ensure acyclicity by only allowing task N to depend on tasks 0..N-1.
fn plan_strategy(max_tasks: usize) -> impl Strategy<Value = TaskPlan> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..3),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut builder = PlanBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let deps: HashSet<String> = if i == 0 {
                    HashSet::new()
                } else {
                    potential_deps
                        .into_iter()
                        .map(|d| format!("task_{}", d % i))
                        .collect()
                };
                let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
                builder = builder.task_after(&format!("task_{i}"), "x", "work", &dep_refs);
            }
            builder.build()
        })
    })
}

/// Every transitive dependent of any failed task.
fn descendants_of_failures(plan: &TaskPlan, failed: &HashSet<usize>) -> HashSet<usize> {
    let mut out = HashSet::new();
    let mut queue: VecDeque<usize> = failed.iter().copied().collect();
    while let Some(i) = queue.pop_front() {
        for &d in plan.dependents_of(i) {
            if out.insert(d) {
                queue.push_back(d);
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn scheduler_terminates_and_respects_dependencies(
        plan in plan_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..4),
        picks in proptest::collection::vec(any::<usize>(), 64),
    ) {
        let plan = Arc::new(plan);
        let n = plan.len();
        let failing: HashSet<usize> = failing.into_iter().filter(|&i| i < n).collect();
        let mut scheduler = DagScheduler::new(Arc::clone(&plan));
        scheduler.seed();

        let mut running: Vec<usize> = Vec::new();
        let mut dispatched: HashSet<usize> = HashSet::new();
        let mut failed: HashSet<usize> = HashSet::new();
        let mut steps = 0;

        loop {
            while let Some(task) = scheduler.dispatch_next() {
                for &dep in plan.dependencies_of(task.index) {
                    prop_assert_eq!(scheduler.states()[dep].status, TaskStatus::Completed);
                }
                prop_assert!(dispatched.insert(task.index), "dispatched twice");
                running.push(task.index);
            }
            if running.is_empty() {
                break;
            }

            // Finish an arbitrary in-flight task.
            let pick = picks[steps % picks.len()] % running.len();
            let index = running.swap_remove(pick);
            let id = plan.task(index).id.clone();
            if failing.contains(&index) {
                failed.insert(index);
                scheduler.on_task_failed(&id, "scripted failure").unwrap();
            } else {
                scheduler.on_task_completed(&id, format!("{id} done")).unwrap();
            }

            steps += 1;
            prop_assert!(steps <= n, "more completions than tasks");
        }

        prop_assert!(scheduler.is_finished());
        prop_assert!(scheduler.stall().is_none());
        prop_assert_eq!(scheduler.active_count(), 0);

        let skipped = descendants_of_failures(&plan, &failed);
        for i in 0..n {
            let status = scheduler.states()[i].status;
            if failed.contains(&i) {
                prop_assert_eq!(status, TaskStatus::Failed);
            } else if skipped.contains(&i) {
                prop_assert_eq!(status, TaskStatus::Skipped);
                prop_assert!(!dispatched.contains(&i), "skipped task was dispatched");
            } else {
                prop_assert_eq!(status, TaskStatus::Completed);
            }
        }
    }
}
