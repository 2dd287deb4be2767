// src/dag/state_manager.rs

//! Readiness and failure propagation over the plan arena.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::dag::task_info::TaskState;
use crate::plan::{NodeIndex, TaskPlan, TaskStatus};

/// Borrowed view over the scheduler's mutable state.
///
/// Every method here runs inside the scheduler's critical section, so each
/// call is atomic with respect to other workers.
pub struct StateManager<'a> {
    plan: &'a TaskPlan,
    states: &'a mut [TaskState],
    in_degree: &'a mut [usize],
    ready: &'a mut VecDeque<NodeIndex>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        plan: &'a TaskPlan,
        states: &'a mut [TaskState],
        in_degree: &'a mut [usize],
        ready: &'a mut VecDeque<NodeIndex>,
    ) -> Self {
        Self {
            plan,
            states,
            in_degree,
            ready,
        }
    }

    /// Promote a `Pending` task with no outstanding dependencies to `Ready`
    /// and append it to the ready queue. Returns whether it was enqueued.
    pub fn enqueue_if_ready(&mut self, index: NodeIndex) -> bool {
        if self.in_degree[index] != 0 || self.states[index].status != TaskStatus::Pending {
            return false;
        }
        self.states[index].status = TaskStatus::Ready;
        self.ready.push_back(index);
        debug!(task = %self.plan.task(index).id, "dependencies satisfied; marked Ready");
        true
    }

    /// Account for the completion of `completed`: decrement each direct
    /// dependent's in-degree and enqueue the ones that reach zero.
    ///
    /// Returns the newly ready tasks in enqueue order.
    pub fn release_dependents(&mut self, completed: NodeIndex) -> Vec<NodeIndex> {
        let mut released = Vec::new();

        for &dependent in self.plan.dependents_of(completed) {
            match self.in_degree[dependent].checked_sub(1) {
                Some(remaining) => self.in_degree[dependent] = remaining,
                None => {
                    warn!(
                        task = %self.plan.task(dependent).id,
                        upstream = %self.plan.task(completed).id,
                        "in-degree already zero; ignoring extra completion"
                    );
                    continue;
                }
            }
            if self.enqueue_if_ready(dependent) {
                released.push(dependent);
            }
        }

        released
    }

    /// Mark every transitive dependent of `failed` as `Skipped`, naming
    /// `failed` as the cause on each of them.
    ///
    /// Breadth-first with a visited set, so a task reachable along several
    /// paths (diamonds) is processed once. Tasks already terminal keep
    /// their state. Returns the newly skipped tasks in visit order.
    pub fn cascade_skip(&mut self, failed: NodeIndex) -> Vec<NodeIndex> {
        let mut skipped = Vec::new();
        let plan = self.plan;
        let failed_id = &plan.task(failed).id;
        let mut visited: HashSet<NodeIndex> = HashSet::from([failed]);
        let mut queue: VecDeque<NodeIndex> = VecDeque::from([failed]);

        while let Some(current) = queue.pop_front() {
            for &dependent in self.plan.dependents_of(current) {
                if !visited.insert(dependent) {
                    continue;
                }

                let state = &mut self.states[dependent];
                match state.status {
                    TaskStatus::Pending | TaskStatus::Ready => {
                        if state.status == TaskStatus::Ready {
                            self.ready.retain(|&i| i != dependent);
                        }
                        state.status = TaskStatus::Skipped;
                        state.error =
                            Some(format!("skipped due to upstream failure in {failed_id}"));
                        debug!(
                            task = %self.plan.task(dependent).id,
                            upstream = %failed_id,
                            "marking dependent Skipped due to upstream failure"
                        );
                        skipped.push(dependent);
                    }
                    TaskStatus::Running => {
                        // Cannot happen for a true dependent; leave it to its worker.
                        warn!(
                            task = %self.plan.task(dependent).id,
                            "dependent of a failed task is already running"
                        );
                    }
                    TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped => {}
                }

                queue.push_back(dependent);
            }
        }

        skipped
    }
}
