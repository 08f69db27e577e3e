//! Terminal output of job events.

use colored::Colorize;
use ot_protocol::ipc::Event;
use ot_protocol::log_models::{LogEvent, Severity};
use ot_protocol::runner_status::RunnerStatus;

pub fn print_event(event: &Event, verbose: bool) {
    match event {
        Event::LogAppended { event, .. } => print_log(event),
        Event::JobStatusChanged { status, .. } => {
            println!("{} {}", "status".bold(), colored_status(*status));
        }
        Event::InstructionStatusChanged {
            index, name, status, ..
        } if verbose => {
            println!("  #{index} {name}: {status}");
        }
        Event::UserChoiceRequested { args, .. } => {
            println!("{} {}", "choice".cyan(), args.options.join(" | "));
        }
        Event::UserInputRequested { args, .. } => {
            println!("{} {}", "input".cyan(), args.description);
        }
        _ => {}
    }
}

fn print_log(event: &LogEvent) {
    let severity = format!("{:<9}", event.severity.as_str());
    let severity = match event.severity {
        s if s.is_error() => severity.red().bold(),
        Severity::Warning => severity.yellow(),
        Severity::Debug | Severity::Trace => severity.dimmed(),
        _ => severity.normal(),
    };
    println!("[{} {}] {severity} {}", event.date, event.time, event.message);
}

fn colored_status(status: RunnerStatus) -> colored::ColoredString {
    match status {
        RunnerStatus::Succeeded => status.as_str().green(),
        RunnerStatus::Failed | RunnerStatus::SubmitFailure => status.as_str().red(),
        RunnerStatus::Halted | RunnerStatus::Canceling => status.as_str().yellow(),
        _ => status.as_str().normal(),
    }
}

pub fn print_summary(name: &str, status: RunnerStatus) {
    println!("{} '{name}' {}", "procedure".bold(), colored_status(status));
}
