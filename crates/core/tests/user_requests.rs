//! Integration tests for user choice and user input requests.

mod common;

use common::*;
use ot_core::domain::scripted::{ScriptAnswer, ScriptStep};
use ot_core::JobError;
use ot_protocol::ipc::Event;
use ot_protocol::request_models::{UserChoiceResult, UserInputResult};
use ot_protocol::runner_status::RunnerStatus;
use std::time::Duration;

fn choice_step() -> ScriptStep {
    ScriptStep::UserChoice {
        options: vec!["left".to_string(), "middle".to_string(), "right".to_string()],
    }
}

fn input_step() -> ScriptStep {
    ScriptStep::UserInput {
        value: serde_json::json!(0),
        description: "setpoint".to_string(),
    }
}

#[tokio::test]
async fn test_user_choice_returns_exact_index() {
    let (mut manager, mut events_rx, factory) = create_scripted_manager(vec![choice_step()]);
    let id = manager
        .start_procedure_request(create_wait_procedure(1))
        .expect("job should start");

    let (request_id, events) = wait_for_user_request(&mut manager, &mut events_rx).await;
    let args = events.iter().find_map(|e| match e {
        Event::UserChoiceRequested { args, .. } => Some(args.clone()),
        _ => None,
    });
    assert_eq!(args.expect("choice requested").options.len(), 3);
    assert_eq!(manager.job(id).expect("job").pending_request_count(), 1);

    manager
        .answer_user_choice(
            id,
            request_id,
            UserChoiceResult {
                index: 2,
                processed: true,
            },
        )
        .expect("answer accepted");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("finished");

    assert_eq!(status, RunnerStatus::Succeeded);
    assert_finished_cleanly(manager.job(id).expect("job"), RunnerStatus::Succeeded);
    assert_eq!(
        factory.last().expect("runtime").answers(),
        vec![ScriptAnswer::Choice(Some(2))]
    );
}

#[tokio::test]
async fn test_out_of_range_choice_is_rejected() {
    let (mut manager, mut events_rx, factory) = create_scripted_manager(vec![choice_step()]);
    let id = manager
        .start_procedure_request(create_wait_procedure(1))
        .expect("job should start");
    let (request_id, _) = wait_for_user_request(&mut manager, &mut events_rx).await;

    let rejected = manager.answer_user_choice(
        id,
        request_id,
        UserChoiceResult {
            index: 99,
            processed: true,
        },
    );

    assert!(matches!(rejected, Err(JobError::InvalidInput(ref m)) if m.contains("3 options")));
    assert_eq!(manager.job(id).expect("job").pending_request_count(), 1);
    assert_eq!(manager.job(id).expect("job").status(), RunnerStatus::Running);

    manager
        .answer_user_choice(
            id,
            request_id,
            UserChoiceResult {
                index: 0,
                processed: true,
            },
        )
        .expect("in-range answer accepted");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("finished");
    assert_eq!(status, RunnerStatus::Succeeded);
    assert_eq!(
        factory.last().expect("runtime").answers(),
        vec![ScriptAnswer::Choice(Some(0))]
    );
}

#[tokio::test]
async fn test_user_input_is_parsed_as_json() {
    let (mut manager, mut events_rx, factory) = create_scripted_manager(vec![input_step()]);
    let id = manager
        .start_procedure_request(create_wait_procedure(1))
        .expect("job should start");
    let (request_id, _) = wait_for_user_request(&mut manager, &mut events_rx).await;

    let invalid = manager.answer_user_input(
        id,
        request_id,
        UserInputResult {
            value: "not json".to_string(),
            processed: true,
        },
    );
    assert!(matches!(invalid, Err(JobError::InvalidInput(_))));

    manager
        .answer_user_input(
            id,
            request_id,
            UserInputResult {
                value: "{\"setpoint\": 4.5}".to_string(),
                processed: true,
            },
        )
        .expect("answer accepted");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("finished");

    assert_eq!(status, RunnerStatus::Succeeded);
    assert_eq!(
        factory.last().expect("runtime").answers(),
        vec![ScriptAnswer::Input(Some(serde_json::json!({"setpoint": 4.5})))]
    );
}

#[tokio::test]
async fn test_dismissed_request_fails_job() {
    let (mut manager, mut events_rx, _factory) = create_scripted_manager(vec![choice_step()]);
    let id = manager
        .start_procedure_request(create_wait_procedure(1))
        .expect("job should start");
    let (request_id, _) = wait_for_user_request(&mut manager, &mut events_rx).await;

    manager
        .answer_user_choice(
            id,
            request_id,
            UserChoiceResult {
                index: 0,
                processed: false,
            },
        )
        .expect("dismissal accepted");
    let status = manager.wait_for_finished(id, TIMEOUT).await.expect("finished");

    assert_eq!(status, RunnerStatus::Failed);
}

#[tokio::test]
async fn test_answer_twice_or_of_wrong_kind_is_rejected() {
    let (mut manager, mut events_rx, _factory) = create_scripted_manager(vec![choice_step()]);
    let id = manager
        .start_procedure_request(create_wait_procedure(1))
        .expect("job should start");
    let (request_id, _) = wait_for_user_request(&mut manager, &mut events_rx).await;

    let wrong_kind = manager.answer_user_input(
        id,
        request_id,
        UserInputResult {
            value: "1".to_string(),
            processed: true,
        },
    );
    assert_eq!(
        wrong_kind,
        Err(JobError::RequestNotFound {
            job_id: id,
            request_id
        })
    );

    let answer = UserChoiceResult {
        index: 1,
        processed: true,
    };
    manager
        .answer_user_choice(id, request_id, answer)
        .expect("first answer accepted");
    assert!(matches!(
        manager.answer_user_choice(id, request_id, answer),
        Err(JobError::RequestNotFound { .. })
    ));

    manager.wait_for_finished(id, TIMEOUT).await.expect("finished");
}

#[tokio::test]
async fn test_stop_while_waiting_for_input_halts() {
    let (mut manager, mut events_rx, factory) = create_scripted_manager(vec![
        input_step(),
        ScriptStep::Message("never reached".to_string()),
    ]);
    let id = manager
        .start_procedure_request(create_wait_procedure(1))
        .expect("job should start");
    let (request_id, _) = wait_for_user_request(&mut manager, &mut events_rx).await;

    manager.stop(id).expect("stop");
    let status = manager
        .wait_for_finished(id, Duration::from_secs(2))
        .await
        .expect("blocked worker must be released");

    assert_eq!(status, RunnerStatus::Halted);
    assert_finished_cleanly(manager.job(id).expect("job"), RunnerStatus::Halted);
    let runtime = factory.last().expect("runtime");
    assert!(runtime.is_halted());
    assert_eq!(runtime.answers(), vec![ScriptAnswer::Input(None)]);

    let late = manager.answer_user_input(
        id,
        request_id,
        UserInputResult {
            value: "1".to_string(),
            processed: true,
        },
    );
    assert!(matches!(late, Err(JobError::RequestNotFound { .. })));
}
