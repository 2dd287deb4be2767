// src/exec/shell.rs

//! Agent that runs a shell command per task.
//!
//! The injected input is written to the child's stdin and the trimmed
//! stdout becomes the task result. A non-zero exit fails the task with the
//! tail of stderr as the error message.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::exec::agent::{Agent, AgentFuture, AgentRequest};

/// How much of stderr is kept in a failure message.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Clone)]
pub struct ShellAgent {
    cmd: String,
}

impl ShellAgent {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run(&self, request: AgentRequest) -> Result<String, AgentError> {
        debug!(
            task = %request.task_id,
            capability = %request.capability,
            cmd = %self.cmd,
            "starting agent process"
        );

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PLANDAG_TASK_ID", &request.task_id)
            .env("PLANDAG_CAPABILITY", &request.capability)
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        // Feed stdin concurrently so a chatty child cannot deadlock on a
        // full stdout pipe while we are still writing.
        if let Some(mut stdin) = child.stdin.take() {
            let input = request.input.clone();
            let task_id = request.task_id.clone();
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(input.as_bytes()).await {
                    debug!(task = %task_id, error = %err, "agent process closed stdin early");
                }
            });
        }

        // Dropping the wait future drops the child, which kills it.
        tokio::select! {
            output = child.wait_with_output() => {
                let output = output?;
                let stderr = String::from_utf8_lossy(&output.stderr);
                for line in stderr.lines() {
                    debug!(task = %request.task_id, "stderr: {}", line);
                }

                if output.status.success() {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    Ok(stdout.trim_end().to_string())
                } else {
                    let code = output.status.code().unwrap_or(-1);
                    let tail = stderr_tail(stderr.trim_end());
                    Err(AgentError::Failed(if tail.is_empty() {
                        format!("agent command exited with code {code}")
                    } else {
                        format!("agent command exited with code {code}: {tail}")
                    }))
                }
            }

            _ = request.cancel.cancelled() => {
                info!(
                    task = %request.task_id,
                    "cancellation requested; killing agent process"
                );
                Err(AgentError::Cancelled)
            }
        }
    }
}

impl Agent for ShellAgent {
    fn execute(&self, request: AgentRequest) -> AgentFuture<'_> {
        Box::pin(self.run(request))
    }
}

fn stderr_tail(stderr: &str) -> &str {
    if stderr.len() <= STDERR_TAIL_BYTES {
        return stderr;
    }
    let mut start = stderr.len() - STDERR_TAIL_BYTES;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    &stderr[start..]
}
