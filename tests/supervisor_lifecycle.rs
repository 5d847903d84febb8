// tests/supervisor_lifecycle.rs

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{init_tracing, with_timeout, TestResult};
use devwatch::cancel::{CancelReason, CancelToken};
use devwatch::console::{LogSink, MemorySink, TaskLogger};
use devwatch::errors::DevwatchError;
use devwatch::supervisor::{exit_code, Supervisor, SupervisorOptions};
use devwatch_test_utils::fake_task::{
    never_ready, ready_after, ready_err, ready_now, FakeTask, StopBehaviour,
};

fn supervisor(token: &CancelToken, timeout_ms: u64) -> Supervisor {
    Supervisor::new(
        token.clone(),
        SupervisorOptions {
            startup_timeout: Duration::from_millis(timeout_ms),
        },
    )
}

fn trigger_after(token: &CancelToken, delay: Duration, reason: CancelReason) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        token.trigger(reason);
    });
}

#[tokio::test]
async fn startup_timeout_cancels_and_stops_every_task() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let fast = FakeTask::new("fast", &token, StopBehaviour::Succeed);
    let stuck = FakeTask::new("stuck", &token, StopBehaviour::Succeed);

    let summary = with_timeout(
        supervisor(&token, 100).run(vec![fast.launch(ready_now()), stuck.launch(never_ready())]),
    )
    .await;

    assert_eq!(summary.reason, CancelReason::StartupTimeout);
    assert_eq!(summary.exit_code(), exit_code::STARTUP_TIMEOUT);
    assert_eq!(fast.stop_calls(), 1);
    assert_eq!(stuck.stop_calls(), 1);
    assert!(summary.reports.iter().all(|r| r.is_ok()));
    Ok(())
}

#[tokio::test]
async fn signal_after_ready_exits_cleanly() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let a = FakeTask::new("a", &token, StopBehaviour::Succeed);
    let b = FakeTask::new("b", &token, StopBehaviour::Succeed);

    trigger_after(&token, Duration::from_millis(100), CancelReason::Signal("SIGINT".into()));
    let summary = with_timeout(supervisor(&token, 2_000).run(vec![
        a.launch(ready_now()),
        b.launch(ready_after(Duration::from_millis(20))),
    ]))
    .await;

    assert_eq!(summary.reason, CancelReason::Signal("SIGINT".into()));
    assert_eq!(summary.exit_code(), exit_code::CLEAN);
    let names: Vec<&str> = summary.reports.iter().map(|r| r.task.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn signal_during_startup_wins_over_timeout() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let slow = FakeTask::new("slow", &token, StopBehaviour::Succeed);

    trigger_after(&token, Duration::from_millis(50), CancelReason::Signal("SIGTERM".into()));
    let summary = with_timeout(supervisor(&token, 3_000).run(vec![slow.launch(never_ready())])).await;

    assert_eq!(summary.reason, CancelReason::Signal("SIGTERM".into()));
    assert_eq!(summary.exit_code(), exit_code::CLEAN);
    assert_eq!(slow.stop_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn failing_stop_does_not_block_the_others() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let stopped = Arc::new(Mutex::new(Vec::new()));
    let first = FakeTask::with_log("first", &token, StopBehaviour::Succeed, Arc::clone(&stopped));
    let broken = FakeTask::with_log(
        "broken",
        &token,
        StopBehaviour::Fail("port still bound".into()),
        Arc::clone(&stopped),
    );
    let panicky = FakeTask::with_log("panicky", &token, StopBehaviour::Panic, Arc::clone(&stopped));
    let slow = FakeTask::with_log(
        "slow",
        &token,
        StopBehaviour::Delay(Duration::from_millis(100)),
        Arc::clone(&stopped),
    );

    trigger_after(&token, Duration::from_millis(50), CancelReason::Signal("SIGINT".into()));
    let summary = with_timeout(supervisor(&token, 2_000).run(vec![
        first.launch(ready_now()),
        broken.launch(ready_now()),
        panicky.launch(ready_now()),
        slow.launch(ready_now()),
    ]))
    .await;

    assert_eq!(summary.reports.len(), 4);
    assert!(summary.reports[0].is_ok());
    let broken_err = summary.reports[1].result.clone().unwrap_err();
    assert!(broken_err.contains("port still bound"), "{broken_err}");
    let panic_err = summary.reports[2].result.clone().unwrap_err();
    assert!(panic_err.contains("panicked"), "{panic_err}");
    assert!(summary.reports[3].is_ok());

    let mut stopped = stopped.lock().unwrap().clone();
    stopped.sort();
    assert_eq!(stopped, vec!["first".to_string(), "slow".to_string()]);
    // A failed stop does not change how the run ended.
    assert_eq!(summary.exit_code(), exit_code::CLEAN);
    Ok(())
}

#[tokio::test]
async fn failed_start_is_a_startup_failure() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let ok = FakeTask::new("ok", &token, StopBehaviour::Succeed);
    let bad = FakeTask::new("emulator", &token, StopBehaviour::Succeed);

    let summary = with_timeout(supervisor(&token, 2_000).run(vec![
        ok.launch(ready_now()),
        bad.launch(ready_err(DevwatchError::NotReady("output ended".into()))),
    ]))
    .await;

    match &summary.reason {
        CancelReason::StartupFailed { task, error } => {
            assert_eq!(task, "emulator");
            assert!(error.contains("output ended"));
        }
        other => panic!("unexpected reason: {other:?}"),
    }
    assert_eq!(summary.exit_code(), exit_code::STARTUP_FAILED);
    assert_eq!(ok.stop_calls(), 1);
    assert_eq!(bad.stop_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_first_build_has_its_own_exit_code() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let tsc = FakeTask::new("tsc", &token, StopBehaviour::Succeed);

    let summary = with_timeout(supervisor(&token, 2_000).run(vec![tsc.launch(ready_err(
        DevwatchError::BuildFailed("exited with code 2".into()),
    ))]))
    .await;

    assert!(matches!(summary.reason, CancelReason::BuildFailed { .. }));
    assert_eq!(summary.exit_code(), exit_code::BUILD_FAILED);
    Ok(())
}

#[tokio::test]
async fn runtime_failure_after_ready() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let sync = FakeTask::new("sync", &token, StopBehaviour::Succeed);

    trigger_after(
        &token,
        Duration::from_millis(50),
        CancelReason::TaskFailed {
            task: "sync".into(),
            error: "permission denied".into(),
        },
    );
    let summary = with_timeout(supervisor(&token, 2_000).run(vec![sync.launch(ready_now())])).await;

    assert_eq!(summary.exit_code(), exit_code::RUNTIME_FAILURE);
    assert_eq!(sync.stop_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn later_triggers_do_not_change_the_reason() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let task = FakeTask::new("a", &token, StopBehaviour::Succeed);

    trigger_after(&token, Duration::from_millis(30), CancelReason::Signal("SIGINT".into()));
    trigger_after(&token, Duration::from_millis(60), CancelReason::StartupTimeout);
    let summary = with_timeout(supervisor(&token, 2_000).run(vec![task.launch(ready_now())])).await;

    assert_eq!(summary.reason, CancelReason::Signal("SIGINT".into()));
    assert_eq!(task.stop_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn shutdown_summary_is_written_to_the_console() -> TestResult {
    init_tracing();
    let token = CancelToken::new();
    let a = FakeTask::new("a", &token, StopBehaviour::Succeed);
    let b = FakeTask::new("b", &token, StopBehaviour::Fail("stuck".into()));
    let console = MemorySink::new();
    let sink: Arc<dyn LogSink> = Arc::new(console.clone());

    trigger_after(&token, Duration::from_millis(50), CancelReason::Signal("SIGINT".into()));
    let summary = with_timeout(
        supervisor(&token, 1_000)
            .with_console(TaskLogger::new("devwatch", None, sink))
            .run(vec![a.launch(ready_now()), b.launch(ready_now())]),
    )
    .await;

    assert_eq!(summary.exit_code(), exit_code::CLEAN);
    let lines = console.lines();
    assert!(lines.iter().any(|l| l.starts_with("shutting down")), "{lines:?}");
    assert!(lines.iter().any(|l| l == "a: stopped"), "{lines:?}");
    assert!(
        lines.iter().any(|l| l.starts_with("b: failed to stop") && l.contains("stuck")),
        "{lines:?}"
    );
    assert_eq!(lines.last().map(String::as_str), Some("shutdown complete"));
    Ok(())
}
