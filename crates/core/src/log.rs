//! Per-job event ledger.
//!
//! A [`JobLog`] keeps every [`LogEvent`] in insertion order. At most one
//! [`MessageSink`] (a message panel) is attached at a time; attaching one
//! replays the whole history first, so its view matches a sink that was
//! attached from the start.

use crate::error::{JobError, JobResult};
use ot_protocol::log_models::LogEvent;
use std::fmt;

/// Display side of a job log.
pub trait MessageSink: Send {
    fn on_clear_log(&mut self);
    fn on_message(&mut self, event: &LogEvent);
}

/// Change notification sent to every connected listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChange {
    Appended { index: usize },
    Cleared,
}

type Listener = Box<dyn FnMut(LogChange) + Send>;

#[derive(Default)]
pub struct JobLog {
    events: Vec<LogEvent>,
    sink: Option<Box<dyn MessageSink>>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for JobLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLog")
            .field("events", &self.events.len())
            .field("has_sink", &self.sink.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl JobLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: LogEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_message(&event);
        }
        let index = self.events.len();
        self.events.push(event);
        self.notify(LogChange::Appended { index });
    }

    pub fn clear_log(&mut self) {
        self.events.clear();
        if let Some(sink) = self.sink.as_mut() {
            sink.on_clear_log();
        }
        self.notify(LogChange::Cleared);
    }

    /// Attaches `sink`, replacing and returning the previous one.
    ///
    /// The new sink is cleared and then receives every stored event in order.
    pub fn set_sink(&mut self, mut sink: Box<dyn MessageSink>) -> Option<Box<dyn MessageSink>> {
        sink.on_clear_log();
        for event in &self.events {
            sink.on_message(event);
        }
        self.sink.replace(sink)
    }

    /// Detaches the current sink.
    pub fn take_sink(&mut self) -> Option<Box<dyn MessageSink>> {
        self.sink.take()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Registers a listener for appends and clears.
    pub fn connect<F>(&mut self, listener: F)
    where
        F: FnMut(LogChange) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, change: LogChange) {
        for listener in &mut self.listeners {
            listener(change);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Bounds-checked access to the `index`-th appended event.
    pub fn at(&self, index: usize) -> JobResult<&LogEvent> {
        self.events.get(index).ok_or(JobError::LogIndexOutOfRange {
            index,
            len: self.events.len(),
        })
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }
}
