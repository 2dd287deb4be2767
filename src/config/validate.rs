// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{AgentConfig, AgentSection, ConfigFile, ExecutorSection, RawConfigFile};
use crate::errors::{PlandagError, Result};
use crate::exec::ExecutorConfig;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PlandagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let executor = validate_executor(&raw.executor)?;
        let agents = validate_agents(&raw.agent)?;
        Ok(ConfigFile::new_unchecked(executor, agents))
    }
}

fn validate_executor(section: &ExecutorSection) -> Result<ExecutorConfig> {
    if section.max_parallel_tasks == 0 {
        return Err(PlandagError::ConfigError(
            "[executor].max_parallel_tasks must be >= 1 (got 0)".to_string(),
        ));
    }
    if section.max_result_bytes == 0 {
        return Err(PlandagError::ConfigError(
            "[executor].max_result_bytes must be >= 1 (got 0)".to_string(),
        ));
    }

    let task_timeout = duration_field("[executor].task_timeout", &section.task_timeout)?;
    let plan_timeout = section
        .plan_timeout
        .as_deref()
        .map(|s| duration_field("[executor].plan_timeout", s))
        .transpose()?;
    let poll_interval = duration_field("[executor].poll_interval", &section.poll_interval)?;
    if poll_interval.is_zero() {
        return Err(PlandagError::ConfigError(
            "[executor].poll_interval must be greater than zero".to_string(),
        ));
    }

    Ok(ExecutorConfig {
        max_parallel_tasks: section.max_parallel_tasks,
        task_timeout: (!task_timeout.is_zero()).then_some(task_timeout),
        capability_timeouts: Default::default(),
        plan_timeout: plan_timeout.filter(|d| !d.is_zero()),
        poll_interval,
        placeholder_policy: section.placeholder_policy,
        max_result_bytes: section.max_result_bytes,
    })
}

fn validate_agents(sections: &BTreeMap<String, AgentSection>) -> Result<BTreeMap<String, AgentConfig>> {
    let mut agents = BTreeMap::new();
    for (capability, section) in sections {
        if capability.trim().is_empty() {
            return Err(PlandagError::ConfigError(
                "agent capability names must not be empty".to_string(),
            ));
        }
        if section.cmd.trim().is_empty() {
            return Err(PlandagError::ConfigError(format!(
                "[agent.{capability}].cmd must not be empty"
            )));
        }
        let timeout = section
            .timeout
            .as_deref()
            .map(|s| duration_field(&format!("[agent.{capability}].timeout"), s))
            .transpose()?;

        agents.insert(
            capability.clone(),
            AgentConfig {
                cmd: section.cmd.clone(),
                timeout,
            },
        );
    }
    Ok(agents)
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| PlandagError::ConfigError(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlaceholderPolicy;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        let exec = cfg.executor_config();
        assert_eq!(exec.max_parallel_tasks, 3);
        assert_eq!(exec.task_timeout, Some(Duration::from_secs(120)));
        assert_eq!(exec.poll_interval, Duration::from_millis(50));
        assert_eq!(exec.placeholder_policy, PlaceholderPolicy::Lenient);
        assert!(cfg.agents().is_empty());
    }

    #[test]
    fn agent_timeouts_become_capability_overrides() {
        let cfg = parse(
            r#"
            [executor]
            task_timeout = "0s"
            placeholder_policy = "strict"

            [agent.email]
            cmd = "cat"
            timeout = "5s"

            [agent.calendar]
            cmd = "cat"
            "#,
        )
        .unwrap();

        let exec = cfg.executor_config();
        assert_eq!(exec.task_timeout, None);
        assert_eq!(exec.placeholder_policy, PlaceholderPolicy::Strict);
        assert_eq!(exec.timeout_for("email"), Some(Duration::from_secs(5)));
        assert_eq!(exec.timeout_for("calendar"), None);
        assert_eq!(cfg.agent_registry().capabilities(), vec!["calendar", "email"]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = parse("[executor]\nmax_parallel_tasks = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_parallel_tasks"), "{err}");
    }

    #[test]
    fn bad_duration_names_the_field() {
        let err = parse("[agent.x]\ncmd = \"cat\"\ntimeout = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("[agent.x].timeout"), "{err}");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(parse("[agent.x]\ncmd = \"  \"\n").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("[executor]\nworkers = 2\n").is_err());
        assert!(parse("[agent.x]\ncmd = \"cat\"\nretries = 1\n").is_err());
        assert!(parse("[other]\n").is_err());
    }
}
