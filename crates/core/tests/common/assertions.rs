//! Custom assertion helpers for job manager tests.

use ot_core::JobContext;
use ot_protocol::ipc::Event;
use ot_protocol::log_models::Severity;
use ot_protocol::runner_status::RunnerStatus;
use uuid::Uuid;

/// Statuses reported for `job_id`, in order.
#[allow(dead_code)]
pub fn status_sequence(events: &[Event], job_id: Uuid) -> Vec<RunnerStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::JobStatusChanged { job_id: id, status } if *id == job_id => Some(*status),
            _ => None,
        })
        .collect()
}

/// Assert that the job log holds an entry of `severity` containing `text`.
#[allow(dead_code)]
pub fn assert_has_log(job: &JobContext, severity: Severity, text: &str) {
    let found = job
        .log()
        .events()
        .iter()
        .any(|event| event.severity == severity && event.message.contains(text));
    assert!(
        found,
        "No {severity} log containing {text:?}, log is: {:#?}",
        job.log().events()
    );
}

/// Assert that the job log holds no entry of `severity` or worse.
#[allow(dead_code)]
pub fn assert_no_log_at_least(job: &JobContext, severity: Severity) {
    let worst = job
        .log()
        .events()
        .iter()
        .find(|event| event.severity.level() <= severity.level());
    assert!(worst.is_none(), "Unexpected log entry: {worst:?}");
}

/// Assert that the job ended in `status` with no worker and no open request.
#[allow(dead_code)]
pub fn assert_finished_cleanly(job: &JobContext, status: RunnerStatus) {
    assert_eq!(job.status(), status, "log is: {:#?}", job.log().events());
    assert!(!job.has_worker(), "worker still attached");
    assert_eq!(job.pending_request_count(), 0, "requests still pending");
}
