#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use plandag::errors::AgentError;
use plandag::exec::{Agent, AgentFuture, AgentRequest};
use tracing::debug;

/// What the agent does for one task.
#[derive(Debug, Clone)]
enum Step {
    Reply(String),
    Fail(String),
    Panic(String),
    /// Wait until the request is cancelled.
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    step: Step,
    delay: Duration,
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task_id: String,
    pub capability: String,
    pub input: String,
    pub started: Instant,
    pub finished: Option<Instant>,
}

#[derive(Debug, Default)]
struct Shared {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Invocation>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

/// A fake agent scripted per task id.
///
/// Tasks without a script reply with `"<capability>(<input>)"` immediately.
/// Every call is recorded, and delays honour the request's cancellation
/// token. Clones share scripts and recordings.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    shared: Arc<Shared>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, task: &str, step: Step) -> Self {
        {
            let mut scripts = self.shared.scripts.lock().unwrap();
            let delay = scripts.get(task).map(|s| s.delay).unwrap_or_default();
            scripts.insert(task.to_string(), Script { step, delay });
        }
        self
    }

    pub fn reply(self, task: &str, result: &str) -> Self {
        self.script(task, Step::Reply(result.to_string()))
    }

    pub fn fail(self, task: &str, error: &str) -> Self {
        self.script(task, Step::Fail(error.to_string()))
    }

    pub fn panic_on(self, task: &str, message: &str) -> Self {
        self.script(task, Step::Panic(message.to_string()))
    }

    pub fn hang(self, task: &str) -> Self {
        self.script(task, Step::Hang)
    }

    /// Sleep for `delay` before acting. Keeps any scripted step.
    pub fn delay(self, task: &str, delay: Duration) -> Self {
        self.shared
            .scripts
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_insert(Script {
                step: Step::Reply(String::new()),
                delay,
            })
            .delay = delay;
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn invoked(&self, task: &str) -> bool {
        self.shared
            .calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.task_id == task)
    }

    /// Input of the first call for `task`.
    pub fn input_of(&self, task: &str) -> Option<String> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.task_id == task)
            .map(|c| c.input.clone())
    }

    /// Task ids in the order their calls started.
    pub fn call_order(&self) -> Vec<String> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.task_id.clone())
            .collect()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.shared.peak.load(Ordering::SeqCst)
    }

    async fn run(&self, request: AgentRequest) -> Result<String, AgentError> {
        let script = self.shared.scripts.lock().unwrap().get(&request.task_id).cloned();
        let slot = {
            let mut calls = self.shared.calls.lock().unwrap();
            calls.push(Invocation {
                task_id: request.task_id.clone(),
                capability: request.capability.clone(),
                input: request.input.clone(),
                started: Instant::now(),
                finished: None,
            });
            calls.len() - 1
        };
        let _guard = InFlight::enter(Arc::clone(&self.shared), slot);
        debug!(task = %request.task_id, input = %request.input, "scripted agent called");

        let Some(script) = script else {
            return Ok(format!("{}({})", request.capability, request.input));
        };

        if !script.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(script.delay) => {}
                _ = request.cancel.cancelled() => return Err(AgentError::Cancelled),
            }
        }

        match script.step {
            Step::Reply(result) if result.is_empty() => {
                Ok(format!("{}({})", request.capability, request.input))
            }
            Step::Reply(result) => Ok(result),
            Step::Fail(error) => Err(AgentError::Failed(error)),
            Step::Panic(message) => panic!("{message}"),
            Step::Hang => {
                request.cancel.cancelled().await;
                Err(AgentError::Cancelled)
            }
        }
    }
}

impl Agent for ScriptedAgent {
    fn execute(&self, request: AgentRequest) -> AgentFuture<'_> {
        Box::pin(self.run(request))
    }
}

/// Tracks in-flight calls; runs on return, error, panic, or abort.
struct InFlight {
    shared: Arc<Shared>,
    slot: usize,
}

impl InFlight {
    fn enter(shared: Arc<Shared>, slot: usize) -> Self {
        let now = shared.running.fetch_add(1, Ordering::SeqCst) + 1;
        shared.peak.fetch_max(now, Ordering::SeqCst);
        Self { shared, slot }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.shared.running.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.shared.calls.lock() {
            if let Some(call) = calls.get_mut(self.slot) {
                call.finished = Some(Instant::now());
            }
        }
    }
}
