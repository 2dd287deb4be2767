// src/dag/shared.rs

//! Thread-safe wrapper that lets a worker pool drive one [`DagScheduler`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::dag::scheduler::{DagScheduler, Stall};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task_info::DispatchedTask;
use crate::errors::SchedulerError;

/// What a worker should do next.
#[derive(Debug)]
pub enum Dispatch {
    /// Run this task.
    Run(DispatchedTask),
    /// Nothing ready yet, but tasks are still running; wait for a change.
    Wait,
    /// Every task is terminal.
    Finished,
    /// No task is ready or running and work remains.
    Stalled(Stall),
}

/// A [`DagScheduler`] behind a mutex, plus a [`Notify`] that wakes idle
/// workers whenever the scheduler state changes.
///
/// Every critical section is a single synchronous scheduler call; the lock
/// is never held across an `.await`.
#[derive(Debug)]
pub struct SharedScheduler {
    inner: Mutex<DagScheduler>,
    changed: Notify,
}

impl SharedScheduler {
    pub fn new(scheduler: DagScheduler) -> Self {
        Self {
            inner: Mutex::new(scheduler),
            changed: Notify::new(),
        }
    }

    /// Seed the ready queue and wake any waiting worker.
    pub fn seed(&self) -> SchedulerStep {
        let step = self.lock().seed();
        self.changed.notify_waiters();
        step
    }

    /// Take the next ready task, or report why there is none.
    pub fn next(&self) -> Dispatch {
        let mut scheduler = self.lock();
        if let Some(task) = scheduler.dispatch_next() {
            return Dispatch::Run(task);
        }
        if scheduler.is_finished() {
            return Dispatch::Finished;
        }
        match scheduler.stall() {
            Some(stall) => Dispatch::Stalled(stall),
            None => Dispatch::Wait,
        }
    }

    pub fn complete(&self, id: &str, result: String) -> Result<SchedulerStep, SchedulerError> {
        let step = self.lock().on_task_completed(id, result);
        self.changed.notify_waiters();
        step
    }

    pub fn fail(&self, id: &str, error: String) -> Result<SchedulerStep, SchedulerError> {
        let step = self.lock().on_task_failed(id, error);
        self.changed.notify_waiters();
        step
    }

    /// Wake every waiting worker without changing state (used on stall and
    /// cancellation so that idle workers re-check and exit).
    pub fn wake_all(&self) {
        self.changed.notify_waiters();
    }

    /// Handle used by workers to wait for the next state change.
    pub fn changed(&self) -> &Notify {
        &self.changed
    }

    /// Run `f` with exclusive access to the scheduler.
    pub fn with<R>(&self, f: impl FnOnce(&DagScheduler) -> R) -> R {
        f(&self.lock())
    }

    #[cfg(test)]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut DagScheduler) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, DagScheduler> {
        // Scheduler calls never panic midway through a mutation, so a
        // poisoned lock still guards consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
