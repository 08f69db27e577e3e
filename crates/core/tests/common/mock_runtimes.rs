//! Mock runtimes, factories and message sinks for testing.

use anyhow::bail;
use ot_core::domain::{DomainObserver, DomainRuntime, RuntimeFactory, TerminalState};
use ot_core::log::MessageSink;
use ot_protocol::log_models::LogEvent;
use ot_protocol::procedure_models::ProcedureDefinition;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A factory that cannot create any runtime.
#[allow(dead_code)]
pub fn failing_factory(reason: &'static str) -> Arc<dyn RuntimeFactory> {
    Arc::new(move |_: &ProcedureDefinition| -> anyhow::Result<Arc<dyn DomainRuntime>> {
        bail!("{reason}")
    })
}

/// Loops over wait points until halted.
///
/// Every iteration is a step, so the flow controller fully governs it.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct EndlessRuntime {
    halted: AtomicBool,
    steps: AtomicUsize,
}

#[allow(dead_code)]
impl EndlessRuntime {
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

impl DomainRuntime for EndlessRuntime {
    fn run(&self, observer: &dyn DomainObserver) -> anyhow::Result<TerminalState> {
        while !self.halted.load(Ordering::SeqCst) {
            observer.on_single_step_start();
            self.steps.fetch_add(1, Ordering::SeqCst);
            observer.on_single_step_end();
        }
        Ok(TerminalState::Halted)
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }
}

/// Hands out [`EndlessRuntime`]s and keeps the last one.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct EndlessFactory {
    last: Mutex<Option<Arc<EndlessRuntime>>>,
}

#[allow(dead_code)]
impl EndlessFactory {
    pub fn last(&self) -> Option<Arc<EndlessRuntime>> {
        self.last.lock().expect("factory lock").clone()
    }
}

impl RuntimeFactory for EndlessFactory {
    fn create(&self, _procedure: &ProcedureDefinition) -> anyhow::Result<Arc<dyn DomainRuntime>> {
        let runtime = Arc::new(EndlessRuntime::default());
        *self.last.lock().expect("factory lock") = Some(Arc::clone(&runtime));
        Ok(runtime)
    }
}

/// What a [`RecordingSink`] received.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Clear,
    Message(String),
}

/// A message panel that records every call.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().expect("sink lock").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Message(text) => Some(text),
                SinkCall::Clear => None,
            })
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn on_clear_log(&mut self) {
        self.calls.lock().expect("sink lock").push(SinkCall::Clear);
    }

    fn on_message(&mut self, event: &LogEvent) {
        self.calls
            .lock()
            .expect("sink lock")
            .push(SinkCall::Message(event.message.clone()));
    }
}
