//! Integration tests for pausing, stepping, pacing and breakpoints.

mod common;

use common::*;
use ot_core::domain::scripted::{ScriptFactory, ScriptStep};
use ot_core::domain::RuntimeFactory;
use ot_core::JobManager;
use ot_protocol::ipc::Event;
use ot_protocol::log_models::Severity;
use ot_protocol::procedure_models::InstructionStatus;
use ot_protocol::runner_status::RunnerStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Waits until the job is paused with its worker parked after `steps` steps.
async fn wait_parked_after(manager: &mut JobManager, id: Uuid, steps: u64) {
    manager
        .wait_until(id, TIMEOUT, |job| {
            job.status() == RunnerStatus::Paused && job.is_parked() && job.steps_finished() == steps
        })
        .await
        .unwrap_or_else(|e| panic!("job not parked after {steps} steps: {e}"));
}

fn endless_manager() -> (JobManager, Arc<EndlessFactory>) {
    let factory = Arc::new(EndlessFactory::default());
    let (manager, _events_rx) = create_test_manager(Arc::clone(&factory) as Arc<dyn RuntimeFactory>);
    (manager, factory)
}

#[tokio::test]
async fn test_step_from_initial_runs_one_step_at_a_time() {
    let (mut manager, factory) = endless_manager();
    let id = manager.submit_job(create_wait_procedure(1)).expect("submitted");

    manager.step(id).expect("step starts the job");
    assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Stepping);
    wait_parked_after(&mut manager, id, 1).await;

    for expected in 2..=4 {
        manager.step(id).expect("step");
        assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Stepping);
        wait_parked_after(&mut manager, id, expected).await;
    }
    assert_eq!(factory.last().expect("runtime").steps(), 4);

    manager.stop(id).expect("stop");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("halted");
    assert_eq!(status, RunnerStatus::Halted);
    assert_finished_cleanly(manager.job(id).expect("job"), RunnerStatus::Halted);
}

#[tokio::test]
async fn test_pause_then_three_steps_then_resume() {
    let (mut manager, factory) = endless_manager();
    let id = manager.submit_job(create_wait_procedure(1)).expect("submitted");
    manager.change_delay(id, 20).expect("delay");

    manager.start(id).expect("start");
    manager
        .wait_until(id, TIMEOUT, |job| job.steps_finished() >= 2)
        .await
        .expect("running");

    manager.pause(id).expect("pause");
    assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Paused);
    manager
        .wait_until(id, TIMEOUT, |job| job.is_parked())
        .await
        .expect("parked");
    let paused_at = manager.job(id).expect("job").steps_finished();
    assert_eq!(factory.last().expect("runtime").steps() as u64, paused_at);

    for offset in 1..=3 {
        manager.step(id).expect("step");
        wait_parked_after(&mut manager, id, paused_at + offset).await;
    }
    assert_eq!(factory.last().expect("runtime").steps() as u64, paused_at + 3);

    manager.change_delay(id, 0).expect("no delay");
    manager.start(id).expect("resume");
    let job = manager.job(id).expect("job");
    assert_eq!(job.status(), RunnerStatus::Running);
    assert_has_log(job, Severity::Info, "Resume request");
    manager
        .wait_until(id, TIMEOUT, |job| job.steps_finished() >= paused_at + 5)
        .await
        .expect("running again");

    manager.stop(id).expect("stop");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("halted");
    assert_eq!(status, RunnerStatus::Halted);
}

#[tokio::test]
async fn test_rejected_commands_leave_warning() {
    let (mut manager, _factory) = endless_manager();
    let id = manager.submit_job(create_wait_procedure(1)).expect("submitted");
    manager.change_delay(id, 20).expect("delay");

    manager.pause(id).expect("pause is a no-op");
    assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Initial);
    assert_has_log(manager.job(id).expect("job"), Severity::Warning, "Pause request ignored");

    manager.step(id).expect("step");
    wait_parked_after(&mut manager, id, 1).await;
    manager.start(id).expect("resume");
    manager.start(id).expect("second start is a no-op");
    assert_has_log(manager.job(id).expect("job"), Severity::Warning, "Start request ignored");
    assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Running);

    manager.stop(id).expect("stop");
    manager.wait_for_finished(id, TIMEOUT).await.expect("halted");
}

#[tokio::test]
async fn test_delay_paces_steps() {
    let (mut manager, _events_rx, _factory) = create_scripted_manager(vec![
        ScriptStep::Message("one".to_string()),
        ScriptStep::Message("two".to_string()),
        ScriptStep::Message("three".to_string()),
    ]);
    let id = manager.submit_job(create_wait_procedure(1)).expect("submitted");
    manager.change_delay(id, 100).expect("delay");
    assert_eq!(manager.job(id).expect("job").delay_msec(), 100);

    let started = Instant::now();
    manager.start(id).expect("start");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("finished");

    assert_eq!(status, RunnerStatus::Succeeded);
    assert!(
        started.elapsed() >= Duration::from_millis(250),
        "three paced steps took only {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_stop_cuts_long_delay() {
    let (mut manager, _events_rx, factory) = create_scripted_manager(vec![
        ScriptStep::Message("one".to_string()),
        ScriptStep::Message("two".to_string()),
    ]);
    let id = manager.submit_job(create_wait_procedure(1)).expect("submitted");
    manager.change_delay(id, 60_000).expect("delay");

    manager.start(id).expect("start");
    manager
        .wait_until(id, TIMEOUT, |job| job.steps_finished() == 1)
        .await
        .expect("first step");
    manager.stop(id).expect("stop");
    assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Canceling);

    let status = manager
        .wait_for_finished(id, Duration::from_secs(2))
        .await
        .expect("stop must not wait for the delay");
    assert_eq!(status, RunnerStatus::Halted);
    assert_eq!(factory.last().expect("runtime").executed_steps(), 1);
    assert_has_log(manager.job(id).expect("job"), Severity::Warning, "Stop request");
}

#[tokio::test]
async fn test_breakpoint_pauses_job() {
    let factory = Arc::new(ScriptFactory::from_procedures());
    let (mut manager, mut events_rx) = create_test_manager(Arc::clone(&factory) as Arc<dyn RuntimeFactory>);
    let procedure = create_test_procedure("bp", &[("Wait", "wait"), ("Message", "report")]);
    let id = manager.submit_job(procedure).expect("submitted");
    manager.set_breakpoint(id, 1).expect("breakpoint");

    manager.start(id).expect("start");
    manager
        .wait_until(id, TIMEOUT, |job| job.status() == RunnerStatus::Paused && job.is_parked())
        .await
        .expect("breakpoint hit");

    let job = manager.job(id).expect("job");
    assert_eq!(job.instruction_status(1), Some(InstructionStatus::NotFinished));
    assert_eq!(job.instruction_status(2), Some(InstructionStatus::NotStarted));
    assert_has_log(job, Severity::Info, "Breakpoint hit at instruction 1 'wait'");
    let events = drain_events(&mut events_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::BreakpointHit { job_id, index: 1 } if *job_id == id)));

    manager.start(id).expect("resume");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("finished");
    assert_eq!(status, RunnerStatus::Succeeded);
    assert_eq!(
        manager.job(id).expect("job").instruction_status(2),
        Some(InstructionStatus::Success)
    );
}

#[tokio::test]
async fn test_delay_change_during_undrained_breakpoint_keeps_single_step() {
    let factory = Arc::new(ScriptFactory::from_procedures());
    let (mut manager, _events_rx) = create_test_manager(Arc::clone(&factory) as Arc<dyn RuntimeFactory>);
    let id = manager.submit_job(create_wait_procedure(6)).expect("submitted");
    manager.set_breakpoint(id, 1).expect("breakpoint");

    manager.start(id).expect("start");
    // The worker reaches the breakpoint while its events sit undrained.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Running);
    manager.change_delay(id, 10).expect("delay");

    manager
        .wait_until(id, TIMEOUT, |job| job.status() == RunnerStatus::Paused && job.is_parked())
        .await
        .expect("breakpoint hit");
    let before = manager.job(id).expect("job").steps_finished();

    manager.step(id).expect("step");
    wait_parked_after(&mut manager, id, before + 1).await;

    let job = manager.job(id).expect("job");
    assert_eq!(job.status(), RunnerStatus::Paused);
    assert_eq!(job.delay_msec(), 10);
    assert_eq!(job.instruction_status(6), Some(InstructionStatus::NotStarted));

    manager.start(id).expect("resume");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("finished");
    assert_eq!(status, RunnerStatus::Succeeded);
}
