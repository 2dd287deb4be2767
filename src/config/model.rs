// src/config/model.rs

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{AgentRegistry, DEFAULT_MAX_RESULT_BYTES, ExecutorConfig, ShellAgent};
use crate::types::PlaceholderPolicy;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [executor]
/// max_parallel_tasks = 3
/// task_timeout = "120s"
/// plan_timeout = "10m"
/// poll_interval = "50ms"
/// placeholder_policy = "lenient"
/// max_result_bytes = 10485760
///
/// [agent.email]
/// cmd = "./agents/email.sh"
/// timeout = "30s"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    /// Shell agents keyed by the capability they serve.
    #[serde(default)]
    pub agent: BTreeMap<String, AgentSection>,
}

/// `[executor]` section. Durations are strings such as `"500ms"` or `"2m"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    /// `"0s"` disables the per-task timeout.
    #[serde(default = "default_task_timeout")]
    pub task_timeout: String,

    #[serde(default)]
    pub plan_timeout: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default)]
    pub placeholder_policy: PlaceholderPolicy,

    #[serde(default = "default_max_result_bytes")]
    pub max_result_bytes: usize,
}

fn default_max_parallel_tasks() -> usize {
    3
}

fn default_task_timeout() -> String {
    "120s".to_string()
}

fn default_poll_interval() -> String {
    "50ms".to_string()
}

fn default_max_result_bytes() -> usize {
    DEFAULT_MAX_RESULT_BYTES
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel_tasks(),
            task_timeout: default_task_timeout(),
            plan_timeout: None,
            poll_interval: default_poll_interval(),
            placeholder_policy: PlaceholderPolicy::default(),
            max_result_bytes: default_max_result_bytes(),
        }
    }
}

/// `[agent.<capability>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    /// Shell command; receives the task input on stdin and prints the
    /// result on stdout.
    pub cmd: String,

    /// Overrides `[executor].task_timeout` for this capability.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// A validated shell agent entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub cmd: String,
    pub timeout: Option<Duration>,
}

/// Validated configuration. Built from [`RawConfigFile`] via `TryFrom`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    executor: ExecutorConfig,
    agents: BTreeMap<String, AgentConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(executor: ExecutorConfig, agents: BTreeMap<String, AgentConfig>) -> Self {
        Self { executor, agents }
    }

    /// Executor settings, with per-capability timeouts filled in from the
    /// agent sections.
    pub fn executor_config(&self) -> ExecutorConfig {
        let mut config = self.executor.clone();
        config.capability_timeouts = self
            .agents
            .iter()
            .filter_map(|(cap, agent)| agent.timeout.map(|t| (cap.clone(), t)))
            .collect::<HashMap<_, _>>();
        config
    }

    pub fn agents(&self) -> &BTreeMap<String, AgentConfig> {
        &self.agents
    }

    /// One [`ShellAgent`] per configured capability.
    pub fn agent_registry(&self) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for (capability, agent) in &self.agents {
            registry.register(capability.clone(), ShellAgent::new(agent.cmd.clone()));
        }
        registry
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ExecutorConfig::default(), BTreeMap::new())
    }
}
