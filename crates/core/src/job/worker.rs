//! Worker thread driving one run of the domain runtime.

use crate::domain::{DomainRuntime, TerminalState};
use crate::error::{JobError, JobResult};
use crate::observer::{JobObserver, RunOutcome};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};
use uuid::Uuid;

/// Spawns the thread executing `runtime`.
///
/// Whatever happens inside the runtime, errors and panics included, the
/// thread ends by posting `Finished` through `observer`.
pub(crate) fn spawn_worker(
    job_id: Uuid,
    run: u64,
    runtime: Arc<dyn DomainRuntime>,
    observer: JobObserver,
) -> JobResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("job-{job_id}"))
        .spawn(move || {
            debug!(%job_id, run, "worker started");
            let result = panic::catch_unwind(AssertUnwindSafe(|| runtime.run(&observer)));

            let outcome = match result {
                Ok(Ok(TerminalState::Succeeded)) => RunOutcome::Succeeded,
                Ok(Ok(TerminalState::Halted)) => RunOutcome::Halted,
                Ok(Ok(TerminalState::Failed)) => {
                    RunOutcome::Failed("procedure reported failure".to_string())
                }
                Ok(Err(e)) => RunOutcome::Failed(format!("{e:#}")),
                Err(payload) => RunOutcome::Failed(format!(
                    "domain runtime panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };

            if let RunOutcome::Failed(reason) = &outcome {
                error!(%job_id, run, "run failed: {reason}");
            }
            debug!(%job_id, run, ?outcome, "worker finished");
            observer.finish(outcome);
        })
        .map_err(|e| JobError::WorkerSpawn(e.to_string()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
