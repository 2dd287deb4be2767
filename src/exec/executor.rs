// src/exec/executor.rs

//! Plan executor: a bounded pool of workers driving one shared scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::context::ContextInjector;
use crate::dag::{DagScheduler, SharedScheduler};
use crate::errors::{PlandagError, Result};
use crate::exec::agent::AgentRegistry;
use crate::exec::events::{EventSink, ExecutionEvent};
use crate::exec::task_runner::{RunContext, non_zero};
use crate::exec::worker::worker_loop;
use crate::plan::{PlanDocument, TaskPlan, TaskSpec};
use crate::report::ExecutionReport;
use crate::types::{CancelReason, PlaceholderPolicy};

/// Default cap on a single task's result.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 10 * 1024 * 1024;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of workers; at most this many agent calls run at once.
    pub max_parallel_tasks: usize,
    /// Per-task limit; `None` (or zero) disables it.
    pub task_timeout: Option<Duration>,
    /// Per-capability overrides of `task_timeout`.
    pub capability_timeouts: HashMap<String, Duration>,
    /// Whole-run limit; on expiry the run is cancelled.
    pub plan_timeout: Option<Duration>,
    /// How long an idle worker sleeps before re-checking the queue if no
    /// change notification arrives.
    pub poll_interval: Duration,
    pub placeholder_policy: PlaceholderPolicy,
    pub max_result_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: 3,
            task_timeout: Some(Duration::from_secs(120)),
            capability_timeouts: HashMap::new(),
            plan_timeout: None,
            poll_interval: Duration::from_millis(50),
            placeholder_policy: PlaceholderPolicy::Lenient,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
        }
    }
}

impl ExecutorConfig {
    /// Effective timeout for a task of `capability`.
    pub fn timeout_for(&self, capability: &str) -> Option<Duration> {
        match self.capability_timeouts.get(capability) {
            Some(&limit) => non_zero(limit),
            None => self.task_timeout.and_then(non_zero),
        }
    }
}

/// Runs validated plans against a set of agents.
#[derive(Debug, Clone)]
pub struct Executor {
    agents: AgentRegistry,
    config: ExecutorConfig,
    events: EventSink,
}

impl Executor {
    pub fn new(agents: AgentRegistry, config: ExecutorConfig) -> Self {
        Self {
            agents,
            config,
            events: EventSink::disabled(),
        }
    }

    /// Send progress events to `tx`. Events are dropped when it is full.
    pub fn with_events(mut self, tx: mpsc::Sender<ExecutionEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Validate `specs` into a plan and execute it.
    pub async fn execute_specs(
        &self,
        specs: impl IntoIterator<Item = TaskSpec>,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport> {
        let plan = TaskPlan::new(specs)?;
        self.execute(plan, cancel).await
    }

    /// Run a decomposition document.
    ///
    /// A document carrying a direct response is answered without calling
    /// any agent; otherwise its tasks are validated and executed.
    pub async fn execute_document(
        &self,
        doc: PlanDocument,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport> {
        let Some(response) = doc.direct_response().map(str::to_string) else {
            return self.execute_specs(doc.into_specs(), cancel).await;
        };

        let run_id = RUN_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let ignored = doc.into_specs().len();
        if ignored > 0 {
            warn!(run_id, ignored, "document has a direct response; its tasks are not run");
        }
        info!(run_id, "answering with the planner's direct response");

        let report = ExecutionReport::direct(run_id, response);
        self.events.emit(ExecutionEvent::PlanStarted {
            run_id,
            tasks: 0,
            ready: Vec::new(),
        });
        self.events.emit(ExecutionEvent::PlanFinished {
            run_id,
            outcome: report.outcome,
        });
        Ok(report)
    }

    /// Execute `plan` to completion, failure, or cancellation.
    ///
    /// Returns `Err` only when the run could not be carried out at all
    /// (bad configuration, or a scheduler stall). Task failures are
    /// reported in the returned [`ExecutionReport`].
    pub async fn execute(&self, plan: TaskPlan, cancel: CancellationToken) -> Result<ExecutionReport> {
        if self.config.max_parallel_tasks == 0 {
            return Err(PlandagError::ConfigError(
                "max_parallel_tasks must be at least 1".to_string(),
            ));
        }

        let run_id = RUN_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("run", run_id);
        self.execute_inner(run_id, plan, cancel).instrument(span).await
    }

    async fn execute_inner(
        &self,
        run_id: u64,
        plan: TaskPlan,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport> {
        let started = Instant::now();
        let plan = Arc::new(plan);
        let shared = Arc::new(SharedScheduler::new(DagScheduler::new(Arc::clone(&plan))));

        let run_cancel = cancel.child_token();
        let ctx = Arc::new(RunContext {
            run_id,
            agents: self.agents.clone(),
            injector: ContextInjector::new(self.config.placeholder_policy),
            config: self.config.clone(),
            events: self.events.clone(),
            cancel: run_cancel.clone(),
        });

        let seed = shared.seed();
        let workers = self.config.max_parallel_tasks.min(plan.len()).max(1);
        info!(
            tasks = plan.len(),
            ready = seed.newly_ready.len(),
            workers,
            "starting plan execution"
        );
        self.events.emit(ExecutionEvent::PlanStarted {
            run_id,
            tasks: plan.len(),
            ready: seed.newly_ready,
        });

        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog = self.config.plan_timeout.and_then(non_zero).map(|limit| {
            let token = run_cancel.clone();
            let flag = Arc::clone(&timed_out);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        warn!(?limit, "plan timeout elapsed; cancelling run");
                        flag.store(true, Ordering::SeqCst);
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            pool.spawn(
                worker_loop(worker, Arc::clone(&shared), Arc::clone(&ctx)).in_current_span(),
            );
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "worker terminated abnormally");
            }
        }
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let cancel_reason = if cancel.is_cancelled() {
            Some(CancelReason::Requested)
        } else if timed_out.load(Ordering::SeqCst) {
            Some(CancelReason::PlanTimeout)
        } else {
            None
        };

        let report = shared.with(|scheduler| {
            final_report(run_id, scheduler, cancel_reason, started.elapsed())
        })?;

        info!(
            outcome = ?report.outcome,
            elapsed_ms = report.elapsed_ms,
            "plan execution finished"
        );
        self.events.emit(ExecutionEvent::PlanFinished {
            run_id,
            outcome: report.outcome,
        });

        Ok(report)
    }
}

/// Build the report for a run whose workers have all exited.
///
/// A stall only counts as an error when nothing cancelled the run;
/// otherwise the unfinished tasks are reported as cancelled.
fn final_report(
    run_id: u64,
    scheduler: &DagScheduler,
    cancel_reason: Option<CancelReason>,
    elapsed: Duration,
) -> Result<ExecutionReport> {
    if let (None, Some(stall)) = (cancel_reason, scheduler.stall()) {
        return Err(PlandagError::Stalled {
            completed: stall.completed,
            total: stall.total,
            remaining: stall.remaining,
        });
    }
    Ok(ExecutionReport::from_scheduler(run_id, scheduler, cancel_reason, elapsed))
}
