// src/exec/agent.rs

//! The agent abstraction: whatever actually performs a task's work.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::AgentError;
use crate::plan::TaskId;

/// Boxed future returned by [`Agent::execute`].
pub type AgentFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>>;

/// One invocation of an agent for one task.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub task_id: TaskId,
    pub capability: String,
    /// Input after placeholder substitution.
    pub input: String,
    /// Fires when the run is cancelled or this invocation times out.
    /// Agents should stop work promptly once it does.
    pub cancel: CancellationToken,
}

/// Performs a task for one or more capabilities.
///
/// Implementations may run concurrently for different tasks and must be
/// safe to share across workers.
pub trait Agent: Send + Sync {
    fn execute(&self, request: AgentRequest) -> AgentFuture<'_>;
}

impl<A: Agent + ?Sized> Agent for Arc<A> {
    fn execute(&self, request: AgentRequest) -> AgentFuture<'_> {
        (**self).execute(request)
    }
}

/// Adapter that turns an async closure into an [`Agent`].
pub struct FnAgent<F> {
    f: F,
}

/// Wrap `f` as an agent.
///
/// ```ignore
/// let echo = agent_fn(|req: AgentRequest| async move { Ok(req.input) });
/// ```
pub fn agent_fn<F, Fut>(f: F) -> FnAgent<F>
where
    F: Fn(AgentRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, AgentError>> + Send + 'static,
{
    FnAgent { f }
}

impl<F, Fut> Agent for FnAgent<F>
where
    F: Fn(AgentRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, AgentError>> + Send + 'static,
{
    fn execute(&self, request: AgentRequest) -> AgentFuture<'_> {
        Box::pin((self.f)(request))
    }
}

/// Capability name -> agent lookup, with an optional catch-all.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
    fallback: Option<Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` for `capability`, replacing any previous one.
    pub fn register(&mut self, capability: impl Into<String>, agent: impl Agent + 'static) -> &mut Self {
        self.agents.insert(capability.into(), Arc::new(agent));
        self
    }

    pub fn with_agent(mut self, capability: impl Into<String>, agent: impl Agent + 'static) -> Self {
        self.register(capability, agent);
        self
    }

    /// Agent used for any capability without a dedicated registration.
    pub fn with_fallback(mut self, agent: impl Agent + 'static) -> Self {
        self.fallback = Some(Arc::new(agent));
        self
    }

    pub fn resolve(&self, capability: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .get(capability)
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Registered capability names, sorted.
    pub fn capabilities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.fallback.is_none()
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("capabilities", &self.capabilities())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
