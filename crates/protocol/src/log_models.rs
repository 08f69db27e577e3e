//! Log event models.
//!
//! A [`LogEvent`] is an immutable record captured from the domain runtime or
//! the job machinery. Events are kept per job in a job log and streamed to
//! message panels.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Importance of a log event, following syslog levels.
///
/// Lower numeric level means more important.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
    Trace,
}

impl Severity {
    /// All severities, most important first.
    pub const ALL: [Severity; 9] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    /// Numeric syslog level, 0 (Emergency) to 8 (Trace).
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Maps a numeric level reported by the domain runtime.
    pub fn from_level(level: u8) -> Option<Severity> {
        Severity::ALL.get(usize::from(level)).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Trace => "TRACE",
        }
    }

    /// Error and anything more important.
    pub fn is_error(self) -> bool {
        self <= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of a job log.
///
/// Equality is structural. Date and time are kept as preformatted strings,
/// the way message panels display them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct LogEvent {
    /// Local date, `YYYY-MM-DD`.
    pub date: String,

    /// Local time with millisecond precision, `HH:MM:SS.mmm`.
    pub time: String,

    pub severity: Severity,

    /// Who produced the event (domain runtime, job control, ...).
    pub source: String,

    pub message: String,
}

impl LogEvent {
    /// Creates an event stamped with the current local date and time.
    pub fn now(
        severity: Severity,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = chrono::Local::now();
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S%.3f").to_string(),
            severity,
            source: source.into(),
            message: message.into(),
        }
    }
}
