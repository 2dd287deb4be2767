// src/exec/events.rs

//! Progress notifications emitted while a plan runs.

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::plan::TaskId;
use crate::report::RunOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    PlanStarted {
        run_id: u64,
        tasks: usize,
        ready: Vec<TaskId>,
    },
    TaskStarted {
        task: TaskId,
        capability: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        purpose: Option<String>,
        worker: usize,
    },
    TaskCompleted {
        task: TaskId,
        elapsed_ms: u64,
    },
    TaskFailed {
        task: TaskId,
        error: String,
    },
    TaskSkipped {
        task: TaskId,
        failed_upstream: TaskId,
    },
    PlanFinished {
        run_id: u64,
        outcome: RunOutcome,
    },
}

/// Optional sender for [`ExecutionEvent`]s.
///
/// Emitting never blocks a worker: when the channel is full the event is
/// dropped with a warning.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<ExecutionEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ExecutionEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event channel full; dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("event receiver dropped; ignoring event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);

        sink.emit(ExecutionEvent::TaskFailed {
            task: "a".into(),
            error: "boom".into(),
        });
        sink.emit(ExecutionEvent::TaskFailed {
            task: "b".into(),
            error: "boom".into(),
        });

        assert!(matches!(
            rx.try_recv(),
            Ok(ExecutionEvent::TaskFailed { task, .. }) if task == "a"
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disabled_sink_is_a_no_op() {
        EventSink::disabled().emit(ExecutionEvent::PlanFinished {
            run_id: 1,
            outcome: RunOutcome::Completed,
        });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ExecutionEvent::TaskSkipped {
            task: "t3".into(),
            failed_upstream: "t1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_skipped");
        assert_eq!(json["failed_upstream"], "t1");
    }
}
