//! Test fixtures for procedures, managers and configuration directories.

use ot_core::domain::registry::DomainRegistry;
use ot_core::domain::scripted::{ScriptFactory, ScriptStep};
use ot_core::domain::RuntimeFactory;
use ot_core::JobManager;
use ot_protocol::config_models::GlobalConfig;
use ot_protocol::ipc::Event;
use ot_protocol::procedure_models::{InstructionDefinition, InstructionStatus, ProcedureDefinition};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_subscriber::EnvFilter;

/// Upper bound for every wait in the tests.
#[allow(dead_code)]
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A `Sequence` named `main` with one child per `(type, name)` pair.
///
/// The sequence has index 0, children follow in order.
#[allow(dead_code)]
pub fn create_test_procedure(name: &str, children: &[(&str, &str)]) -> ProcedureDefinition {
    let mut root = InstructionDefinition::new("Sequence", "main");
    for (type_name, child_name) in children {
        root = root.with_child(InstructionDefinition::new(*type_name, *child_name));
    }
    ProcedureDefinition {
        name: name.to_string(),
        instructions: vec![root],
        variables: Vec::new(),
    }
}

/// A procedure with a sequence and `count` `Wait` children.
#[allow(dead_code)]
pub fn create_wait_procedure(count: usize) -> ProcedureDefinition {
    let names: Vec<String> = (0..count).map(|i| format!("wait-{i}")).collect();
    let children: Vec<(&str, &str)> = names.iter().map(|n| ("Wait", n.as_str())).collect();
    create_test_procedure("waits", &children)
}

/// One successful instruction step per index in `0..count`.
#[allow(dead_code)]
pub fn instruction_steps(count: u32) -> Vec<ScriptStep> {
    (0..count)
        .map(|index| ScriptStep::Instruction {
            index,
            status: InstructionStatus::Success,
        })
        .collect()
}

/// Routes `tracing` output to the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A manager with the standard registry and default configuration.
#[allow(dead_code)]
pub fn create_test_manager(factory: Arc<dyn RuntimeFactory>) -> (JobManager, UnboundedReceiver<Event>) {
    create_test_manager_with_config(factory, GlobalConfig::default())
}

#[allow(dead_code)]
pub fn create_test_manager_with_config(
    factory: Arc<dyn RuntimeFactory>,
    config: GlobalConfig,
) -> (JobManager, UnboundedReceiver<Event>) {
    init_tracing();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(DomainRegistry::from_config(&config));
    (JobManager::new(registry, factory, config, events_tx), events_rx)
}

/// A manager whose runs all play `steps`.
#[allow(dead_code)]
pub fn create_scripted_manager(
    steps: Vec<ScriptStep>,
) -> (JobManager, UnboundedReceiver<Event>, Arc<ScriptFactory>) {
    let factory = Arc::new(ScriptFactory::new(steps));
    let (manager, events_rx) = create_test_manager(Arc::clone(&factory) as Arc<dyn RuntimeFactory>);
    (manager, events_rx, factory)
}

/// Everything sent to the GUI so far.
#[allow(dead_code)]
pub fn drain_events(events_rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        events.push(event);
    }
    events
}

/// Create a temporary project directory with `.oac-tree-gui` configuration.
///
/// This creates:
/// - `.oac-tree-gui/config.toml` with a custom delay and an extra type
/// - `.oac-tree-gui/procedures/` with a JSON and a YAML procedure
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_test_project() -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path();

    std::fs::create_dir_all(root.join(".oac-tree-gui/procedures"))?;

    let config_toml = r#"
tick_timeout_msec = 20
log_source = "test-gui"
extra_instruction_types = ["ChannelAccessRead"]
"#;
    std::fs::write(root.join(".oac-tree-gui/config.toml"), config_toml)?;

    let json = r#"{
  "name": "read-channel",
  "instructions": [
    {
      "type-name": "Sequence",
      "name": "main",
      "children": [{ "type-name": "ChannelAccessRead", "name": "read" }]
    }
  ]
}"#;
    std::fs::write(root.join(".oac-tree-gui/procedures/read.json"), json)?;

    let yaml = r#"
name: counter
instructions:
  - type-name: Sequence
    name: main
    children:
      - type-name: Increment
        name: inc
      - type-name: Message
        name: report
variables:
  - name: count
    type-name: Local
    value: "1"
"#;
    std::fs::write(root.join(".oac-tree-gui/procedures/counter.yaml"), yaml)?;

    Ok(temp_dir)
}

/// Applies worker events until the GUI is asked for a choice or an input.
///
/// Returns the request id and every event seen on the way, the request
/// included.
#[allow(dead_code)]
pub async fn wait_for_user_request(
    manager: &mut JobManager,
    events_rx: &mut UnboundedReceiver<Event>,
) -> (u64, Vec<Event>) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let mut seen = Vec::new();
    loop {
        for event in drain_events(events_rx) {
            let request_id = match &event {
                Event::UserChoiceRequested { request_id, .. }
                | Event::UserInputRequested { request_id, .. } => Some(*request_id),
                _ => None,
            };
            seen.push(event);
            if let Some(request_id) = request_id {
                return (request_id, seen);
            }
        }
        let applied = tokio::time::timeout_at(deadline, manager.next_event())
            .await
            .expect("no user request within timeout");
        assert!(applied, "job message channel closed");
    }
}
