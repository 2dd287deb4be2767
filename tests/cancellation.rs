mod common;
use crate::common::{PlanBuilder, ScriptedAgent, config, executor_with, init_tracing, with_timeout};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use plandag::exec::ExecutorConfig;
use plandag::plan::TaskStatus;
use plandag::report::RunOutcome;
use plandag::types::CancelReason;

fn cancel_after(token: &CancellationToken, after: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        token.cancel();
    });
}

#[tokio::test(start_paused = true)]
async fn cancel_while_tasks_are_in_flight_returns_promptly() {
    init_tracing();
    let plan = PlanBuilder::new()
        .task("T1", "email", "count unread emails")
        .task("T2", "schedule", "list today's events")
        .task_after(
            "T3",
            "memo",
            "Summarize {{T1.result}} and {{T2.result}}",
            &["T1", "T2"],
        )
        .build();
    let agent = ScriptedAgent::new().hang("T1").hang("T2");
    let executor = executor_with(&agent, config(3));
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(50));

    let report = with_timeout(executor.execute(plan, cancel)).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.cancel_reason, Some(CancelReason::Requested));
    // Both calls observed cancellation; their tasks stay non-terminal.
    assert_eq!(report.status_of("T1"), Some(TaskStatus::Running));
    assert_eq!(report.status_of("T2"), Some(TaskStatus::Running));
    assert_eq!(report.status_of("T3"), Some(TaskStatus::Pending));
    assert!(!agent.invoked("T3"));
}

#[tokio::test(start_paused = true)]
async fn finished_tasks_keep_their_results_after_cancel() {
    init_tracing();
    let plan = PlanBuilder::new()
        .task("quick", "x", "fast")
        .task("slow", "x", "slow")
        .task_after("after", "x", "{{quick.result}}", &["quick", "slow"])
        .build();
    let agent = ScriptedAgent::new()
        .reply("quick", "early result")
        .delay("slow", Duration::from_secs(60));
    let executor = executor_with(&agent, config(2));
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(100));

    let report = with_timeout(executor.execute(plan, cancel)).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.status_of("quick"), Some(TaskStatus::Completed));
    assert_eq!(report.result_of("quick"), Some("early result"));
    assert_eq!(report.combined_output().as_deref(), Some("early result"));
    assert_eq!(report.status_of("after"), Some(TaskStatus::Pending));
}

#[tokio::test]
async fn already_cancelled_token_runs_nothing() {
    let plan = PlanBuilder::new().task("a", "x", "1").task("b", "x", "2").build();
    let agent = ScriptedAgent::new();
    let executor = executor_with(&agent, config(2));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = executor.execute(plan, cancel).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(agent.invocations().is_empty());
    assert_eq!(report.count(TaskStatus::Ready), 2);
}

#[tokio::test(start_paused = true)]
async fn plan_timeout_cancels_the_run() {
    init_tracing();
    let plan = PlanBuilder::new()
        .task("a", "x", "1")
        .task("b", "x", "2")
        .build();
    let agent = ScriptedAgent::new().reply("a", "done").hang("b");
    let executor = executor_with(
        &agent,
        ExecutorConfig {
            plan_timeout: Some(Duration::from_millis(500)),
            ..config(2)
        },
    );

    let report = with_timeout(executor.execute(plan, CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.cancel_reason, Some(CancelReason::PlanTimeout));
    assert_eq!(report.result_of("a"), Some("done"));
    assert_eq!(report.status_of("b"), Some(TaskStatus::Running));
}

#[tokio::test(start_paused = true)]
async fn plan_timeout_does_not_fire_for_fast_runs() {
    let plan = PlanBuilder::new().task("a", "x", "1").build();
    let agent = ScriptedAgent::new();
    let executor = executor_with(
        &agent,
        ExecutorConfig {
            plan_timeout: Some(Duration::from_secs(10)),
            ..config(1)
        },
    );

    let report = executor.execute(plan, CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.cancel_reason, None);
}
