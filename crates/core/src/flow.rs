//! Pacing of a single job run.
//!
//! The worker thread calls [`FlowController::wait_if_necessary`] between
//! two steps of the procedure. The thread owning the job manager decides
//! what that call does by switching the [`WaitingMode`].
//!
//! Release tokens are counted: every [`FlowController::step_request`] lets
//! exactly one wait through, even when it is issued before the worker
//! reaches its wait point.

use crate::error::{JobError, JobResult};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Sleep time used until [`FlowController::set_sleep_time`] is called.
pub const DEFAULT_SLEEP_TIME_MSEC: u64 = 100;

/// Policy applied at a wait point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitingMode {
    /// No waiting.
    #[default]
    Proceed,
    /// Sleep for the configured duration.
    SleepFor,
    /// Block until a step is released.
    WaitForRelease,
}

#[derive(Debug)]
struct FlowState {
    mode: WaitingMode,
    sleep: Duration,
    tokens: u64,
    /// Tokens handed out since creation.
    granted: u64,
    /// Tokens consumed by a wait or discarded by a mode change.
    retired: u64,
    interrupted: bool,
    waiters: u64,
}

impl FlowState {
    fn discard_tokens(&mut self) {
        self.retired += self.tokens;
        self.tokens = 0;
    }

    fn grant(&mut self, count: u64) {
        self.tokens += count;
        self.granted += count;
    }
}

/// Thread-safe pacing primitive shared by a worker and its job manager.
#[derive(Debug)]
pub struct FlowController {
    state: Mutex<FlowState>,
    cond: Condvar,
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowController {
    /// Creates a controller in `Proceed` mode.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlowState {
                mode: WaitingMode::Proceed,
                sleep: Duration::from_millis(DEFAULT_SLEEP_TIME_MSEC),
                tokens: 0,
                granted: 0,
                retired: 0,
                interrupted: false,
                waiters: 0,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the policy applied at the next wait point.
    ///
    /// A wait in progress keeps its policy. Leaving `WaitForRelease`
    /// discards queued release tokens. A previous [`interrupt`](Self::interrupt)
    /// is cleared.
    pub fn set_waiting_mode(&self, mode: WaitingMode) {
        let mut state = self.lock();
        if state.mode == WaitingMode::WaitForRelease && mode != WaitingMode::WaitForRelease {
            state.discard_tokens();
        }
        state.mode = mode;
        state.interrupted = false;
    }

    /// Switches to `WaitForRelease` keeping a pending interrupt.
    ///
    /// Used from the worker side (breakpoints), where a stop issued
    /// concurrently must still win.
    pub fn hold(&self) {
        self.lock().mode = WaitingMode::WaitForRelease;
    }

    /// Switches to `mode` and releases every currently parked wait.
    ///
    /// This is how a paused job resumes: unlike
    /// [`set_waiting_mode`](Self::set_waiting_mode) it also affects the wait
    /// in progress.
    pub fn release(&self, mode: WaitingMode) {
        let mut state = self.lock();
        state.discard_tokens();
        state.mode = mode;
        let waiters = state.waiters;
        state.grant(waiters);
        drop(state);
        self.cond.notify_all();
    }

    /// Configures the `SleepFor` duration.
    ///
    /// # Errors
    ///
    /// Returns `JobError::InvalidSleepTime` for zero; the previous value is
    /// kept.
    pub fn set_sleep_time(&self, msec: u64) -> JobResult<()> {
        if msec == 0 {
            return Err(JobError::InvalidSleepTime(msec));
        }
        self.lock().sleep = Duration::from_millis(msec);
        Ok(())
    }

    /// Releases exactly one wait, now or at the next wait point.
    pub fn step_request(&self) {
        self.lock().grant(1);
        self.cond.notify_one();
    }

    /// Unblocks every current and future wait until a new mode is set.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
        self.cond.notify_all();
    }

    /// Called by the worker between two steps.
    pub fn wait_if_necessary(&self) {
        self.wait_if_necessary_with(|_| {});
    }

    /// Like [`wait_if_necessary`](Self::wait_if_necessary), calling `on_park`
    /// right before blocking in `WaitForRelease` mode.
    ///
    /// `on_park` receives the number of retired tokens; once it equals
    /// [`granted`](Self::granted) the worker has used every released step.
    /// It runs under the controller lock and must not call back into the
    /// controller.
    pub fn wait_if_necessary_with<F>(&self, on_park: F)
    where
        F: FnOnce(u64),
    {
        let mut state = self.lock();
        if state.interrupted {
            return;
        }

        match state.mode {
            WaitingMode::Proceed => {}
            WaitingMode::SleepFor => {
                let sleep = state.sleep;
                let _guard = self
                    .cond
                    .wait_timeout_while(state, sleep, |s| !s.interrupted)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            WaitingMode::WaitForRelease => {
                if state.tokens == 0 {
                    on_park(state.retired);
                }
                state.waiters += 1;
                let mut state = self
                    .cond
                    .wait_while(state, |s| !s.interrupted && s.tokens == 0)
                    .unwrap_or_else(PoisonError::into_inner);
                state.waiters -= 1;
                if state.tokens > 0 {
                    state.tokens -= 1;
                    state.retired += 1;
                }
            }
        }
    }

    /// True while a worker is parked in `WaitForRelease`.
    pub fn is_waiting(&self) -> bool {
        self.lock().waiters > 0
    }

    pub fn waiting_mode(&self) -> WaitingMode {
        self.lock().mode
    }

    pub fn sleep_time(&self) -> Duration {
        self.lock().sleep
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    /// Release tokens handed out so far.
    pub fn granted(&self) -> u64 {
        self.lock().granted
    }
}
