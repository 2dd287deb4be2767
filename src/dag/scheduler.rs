use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{DispatchedTask, TaskState};
use crate::errors::SchedulerError;
use crate::plan::{NodeIndex, TaskId, TaskPlan, TaskStatus};

/// The scheduler can make no further progress although work remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stall {
    pub completed: usize,
    pub total: usize,
    pub remaining: Vec<TaskId>,
}

/// DagScheduler holds the immutable plan plus the mutable execution state.
///
/// It is responsible for:
/// - seeding the ready queue with tasks that have no dependencies
/// - handing ready tasks out in FIFO order, marking them `Running`
/// - recording completions and releasing dependents
/// - recording failures and skipping every transitive dependent
/// - detecting termination and stalls
///
/// The scheduler itself is synchronous and single-threaded; concurrent
/// workers share it through [`crate::dag::SharedScheduler`].
#[derive(Debug)]
pub struct DagScheduler {
    plan: Arc<TaskPlan>,
    states: Vec<TaskState>,
    in_degree: Vec<usize>,
    ready: VecDeque<NodeIndex>,
    active: usize,
    seeded: bool,
}

impl DagScheduler {
    pub fn new(plan: Arc<TaskPlan>) -> Self {
        let states = (0..plan.len()).map(|_| TaskState::pending()).collect();
        let in_degree = plan.initial_in_degree();

        Self {
            plan,
            states,
            in_degree,
            ready: VecDeque::new(),
            active: 0,
            seeded: false,
        }
    }

    pub fn plan(&self) -> &Arc<TaskPlan> {
        &self.plan
    }

    /// Enqueue every task whose in-degree is zero, in plan order.
    ///
    /// Only the first call has an effect.
    pub fn seed(&mut self) -> SchedulerStep {
        if self.seeded {
            warn!("seed called more than once; ignoring");
            return SchedulerStep::default();
        }
        self.seeded = true;

        let plan = Arc::clone(&self.plan);
        let mut manager = self.manager(&plan);
        let newly_ready: Vec<NodeIndex> = (0..plan.len())
            .filter(|&i| manager.enqueue_if_ready(i))
            .collect();

        info!(
            tasks = plan.len(),
            ready = newly_ready.len(),
            "scheduler: seeded ready queue"
        );

        SchedulerStep {
            newly_ready: self.ids(&newly_ready),
            newly_skipped: Vec::new(),
            plan_finished: self.is_finished(),
        }
    }

    /// Pop the next ready task, mark it `Running` and count it as active.
    pub fn dispatch_next(&mut self) -> Option<DispatchedTask> {
        while let Some(index) = self.ready.pop_front() {
            if self.states[index].status != TaskStatus::Ready {
                // Skipped while queued.
                continue;
            }

            self.states[index].status = TaskStatus::Running;
            self.active += 1;

            let spec = self.plan.task(index);
            let upstream = self
                .plan
                .references_of(index)
                .iter()
                .filter_map(|id| {
                    let dep = self.plan.index_of(id)?;
                    match self.states[dep].status {
                        TaskStatus::Completed => self.states[dep]
                            .result
                            .as_ref()
                            .map(|r| (id.clone(), Arc::clone(r))),
                        _ => None,
                    }
                })
                .collect::<HashMap<_, _>>();

            debug!(
                task = %spec.id,
                capability = %spec.capability,
                active = self.active,
                ready = self.ready.len(),
                "dispatching task"
            );

            return Some(DispatchedTask {
                index,
                id: spec.id.clone(),
                capability: spec.capability.clone(),
                input_template: spec.input.clone(),
                purpose: spec.purpose.clone(),
                upstream,
            });
        }
        None
    }

    /// Record a successful result and release dependents.
    ///
    /// The result write, the in-degree decrements and the enqueue of newly
    /// ready dependents all happen in this one call.
    pub fn on_task_completed(
        &mut self,
        id: &str,
        result: impl Into<Arc<str>>,
    ) -> Result<SchedulerStep, SchedulerError> {
        let index = self.running_index(id, TaskStatus::Completed)?;

        let state = &mut self.states[index];
        state.status = TaskStatus::Completed;
        state.result = Some(result.into());
        self.active -= 1;
        debug!(task = %id, active = self.active, "task completed");

        let plan = Arc::clone(&self.plan);
        let released = self.manager(&plan).release_dependents(index);

        Ok(SchedulerStep {
            newly_ready: self.ids(&released),
            newly_skipped: Vec::new(),
            plan_finished: self.finish_check(),
        })
    }

    /// Record a failure and skip every transitive dependent.
    pub fn on_task_failed(
        &mut self,
        id: &str,
        error: impl Into<String>,
    ) -> Result<SchedulerStep, SchedulerError> {
        let index = self.running_index(id, TaskStatus::Failed)?;

        let error = error.into();
        warn!(task = %id, error = %error, "task failed; skipping dependents");

        let state = &mut self.states[index];
        state.status = TaskStatus::Failed;
        state.error = Some(error);
        self.active -= 1;

        let plan = Arc::clone(&self.plan);
        let skipped = self.manager(&plan).cascade_skip(index);
        if !skipped.is_empty() {
            info!(task = %id, skipped = skipped.len(), "cascade skip finished");
        }

        Ok(SchedulerStep {
            newly_ready: Vec::new(),
            newly_skipped: self.ids(&skipped),
            plan_finished: self.finish_check(),
        })
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.state_of(id).map(|s| s.status)
    }

    pub fn state_of(&self, id: &str) -> Option<&TaskState> {
        self.plan.index_of(id).map(|i| &self.states[i])
    }

    /// Remaining not-yet-completed dependencies of a task.
    pub fn in_degree_of(&self, id: &str) -> Option<usize> {
        self.plan.index_of(id).map(|i| self.in_degree[i])
    }

    pub fn states(&self) -> &[TaskState] {
        &self.states
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Every task is terminal.
    pub fn is_finished(&self) -> bool {
        self.states.iter().all(|s| s.status.is_terminal())
    }

    /// `Some` when nothing is ready, nothing is running, and yet some task
    /// is not terminal. With a validated plan this indicates a scheduler
    /// defect rather than a task failure.
    pub fn stall(&self) -> Option<Stall> {
        if !self.seeded || !self.ready.is_empty() || self.active != 0 || self.is_finished() {
            return None;
        }

        let remaining: Vec<TaskId> = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.status.is_terminal())
            .map(|(i, _)| self.plan.task(i).id.clone())
            .collect();

        Some(Stall {
            completed: self.states.len() - remaining.len(),
            total: self.states.len(),
            remaining,
        })
    }

    /// Drop every queued task without dispatching it, leaving the
    /// scheduler stalled.
    #[cfg(test)]
    pub(crate) fn lose_ready_queue(&mut self) {
        self.ready.clear();
    }

    fn manager<'a>(&'a mut self, plan: &'a TaskPlan) -> StateManager<'a> {
        StateManager::new(plan, &mut self.states, &mut self.in_degree, &mut self.ready)
    }

    fn running_index(&self, id: &str, to: TaskStatus) -> Result<NodeIndex, SchedulerError> {
        let index = self
            .plan
            .index_of(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;

        let from = self.states[index].status;
        if from != TaskStatus::Running {
            return Err(SchedulerError::InvalidTransition {
                task: id.to_string(),
                from,
                to,
            });
        }
        Ok(index)
    }

    fn finish_check(&self) -> bool {
        let finished = self.is_finished();
        if finished {
            info!(tasks = self.states.len(), "scheduler: all tasks terminal");
        }
        finished
    }

    fn ids(&self, indices: &[NodeIndex]) -> Vec<TaskId> {
        indices
            .iter()
            .map(|&i| self.plan.task(i).id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::TaskSpec;

    fn scheduler(specs: Vec<TaskSpec>) -> DagScheduler {
        DagScheduler::new(Arc::new(TaskPlan::new(specs).unwrap()))
    }

    fn diamond() -> DagScheduler {
        scheduler(vec![
            TaskSpec::new("A", "memo", "root"),
            TaskSpec::new("B", "memo", "b {{A.result}}").depends_on("A"),
            TaskSpec::new("C", "memo", "c {{A.result}}").depends_on("A"),
            TaskSpec::new("D", "memo", "{{B.result}}+{{C.result}}")
                .depends_on("B")
                .depends_on("C"),
        ])
    }

    fn dispatch(s: &mut DagScheduler) -> DispatchedTask {
        s.dispatch_next().expect("a ready task")
    }

    #[test]
    fn seed_enqueues_roots_in_plan_order_once() {
        let mut s = scheduler(vec![
            TaskSpec::new("T1", "email", "x"),
            TaskSpec::new("T2", "schedule", "y"),
            TaskSpec::new("T3", "memo", "z").depends_on("T1").depends_on("T2"),
        ]);

        let step = s.seed();
        assert_eq!(step.newly_ready, vec!["T1", "T2"]);
        assert_eq!(s.status_of("T3"), Some(TaskStatus::Pending));
        assert_eq!(s.seed(), SchedulerStep::default());
        assert_eq!(s.ready_len(), 2);
    }

    #[test]
    fn dependents_wait_for_every_dependency() {
        let mut s = diamond();
        s.seed();

        let a = dispatch(&mut s);
        assert_eq!(a.id, "A");
        assert!(s.dispatch_next().is_none());

        let step = s.on_task_completed("A", "ra").unwrap();
        assert_eq!(step.newly_ready, vec!["B", "C"]);

        let b = dispatch(&mut s);
        let c = dispatch(&mut s);
        assert_eq!(b.upstream.get("A").map(|r| r.as_ref()), Some("ra"));
        assert_eq!(s.active_count(), 2);

        let step = s.on_task_completed(&b.id, "rb").unwrap();
        assert!(step.newly_ready.is_empty());
        assert_eq!(s.in_degree_of("D"), Some(1));

        let step = s.on_task_completed(&c.id, "rc").unwrap();
        assert_eq!(step.newly_ready, vec!["D"]);

        let d = dispatch(&mut s);
        assert_eq!(d.upstream.len(), 2);
        let step = s.on_task_completed("D", "rd").unwrap();
        assert!(step.plan_finished);
        assert!(s.is_finished());
        assert!(s.stall().is_none());
    }

    #[test]
    fn diamond_failure_skips_each_descendant_once() {
        let mut s = diamond();
        s.seed();
        dispatch(&mut s);

        let step = s.on_task_failed("A", "boom").unwrap();
        assert_eq!(step.newly_skipped, vec!["B", "C", "D"]);
        assert!(step.plan_finished);

        for id in ["B", "C", "D"] {
            assert_eq!(s.status_of(id), Some(TaskStatus::Skipped));
        }
        assert_eq!(
            s.state_of("D").unwrap().error.as_deref(),
            Some("skipped due to upstream failure in A")
        );
        assert!(s.dispatch_next().is_none());
    }

    #[test]
    fn deep_skips_name_the_task_that_failed() {
        let mut s = scheduler(vec![
            TaskSpec::new("A", "memo", "root"),
            TaskSpec::new("B", "memo", "{{A.result}}").depends_on("A"),
            TaskSpec::new("C", "memo", "{{B.result}}").depends_on("B"),
            TaskSpec::new("D", "memo", "{{C.result}}").depends_on("C"),
        ]);
        s.seed();
        dispatch(&mut s);

        let step = s.on_task_failed("A", "boom").unwrap();
        assert_eq!(step.newly_skipped, vec!["B", "C", "D"]);
        for id in ["B", "C", "D"] {
            assert_eq!(
                s.state_of(id).unwrap().error.as_deref(),
                Some("skipped due to upstream failure in A"),
                "{id}"
            );
        }
    }

    #[test]
    fn failure_does_not_touch_sibling_branches() {
        let mut s = scheduler(vec![
            TaskSpec::new("T1", "email", "x"),
            TaskSpec::new("T2", "schedule", "y"),
            TaskSpec::new("T3", "memo", "z").depends_on("T1").depends_on("T2"),
            TaskSpec::new("T4", "memo", "w").depends_on("T2"),
        ]);
        s.seed();
        dispatch(&mut s);
        dispatch(&mut s);

        let step = s.on_task_failed("T1", "timeout").unwrap();
        assert_eq!(step.newly_skipped, vec!["T3"]);
        assert!(!step.plan_finished);

        let step = s.on_task_completed("T2", "ok").unwrap();
        assert_eq!(step.newly_ready, vec!["T4"]);
        assert_eq!(s.status_of("T3"), Some(TaskStatus::Skipped));
    }

    #[test]
    fn rejects_outcomes_for_tasks_that_are_not_running() {
        let mut s = diamond();
        s.seed();

        assert_eq!(
            s.on_task_completed("B", "early"),
            Err(SchedulerError::InvalidTransition {
                task: "B".to_string(),
                from: TaskStatus::Pending,
                to: TaskStatus::Completed,
            })
        );
        assert_eq!(
            s.on_task_failed("nope", "x"),
            Err(SchedulerError::UnknownTask("nope".to_string()))
        );

        dispatch(&mut s);
        s.on_task_completed("A", "once").unwrap();
        assert!(s.on_task_completed("A", "twice").is_err());
        assert_eq!(s.state_of("A").unwrap().result.as_deref(), Some("once"));
    }

    #[test]
    fn stall_is_reported_when_no_progress_is_possible() {
        let mut s = diamond();
        assert!(s.stall().is_none(), "not seeded yet");
        s.seed();

        // Simulate a lost dispatch: the only ready task vanishes from the queue.
        s.lose_ready_queue();
        let stall = s.stall().expect("stall");
        assert_eq!(stall.total, 4);
        assert_eq!(stall.completed, 0);
        assert_eq!(stall.remaining, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn empty_plan_is_finished_after_seed() {
        let mut s = scheduler(Vec::new());
        let step = s.seed();
        assert!(step.plan_finished);
        assert!(s.stall().is_none());
    }
}
