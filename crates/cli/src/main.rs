//! Headless runner for oac-tree procedures.
//!
//! Loads `.oac-tree-gui/` from a project root and runs one of its procedures
//! with the simulated runtime, printing the job log as it grows.

mod render;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;
use ot_core::config::loader::load_config;
use ot_core::config::models::AppConfig;
use ot_core::domain::registry::DomainRegistry;
use ot_core::domain::scripted::ScriptFactory;
use ot_core::domain::RuntimeFactory;
use ot_core::{JobContext, JobManager};
use ot_protocol::ipc::Event;
use ot_protocol::request_models::{UserChoiceResult, UserInputResult};
use ot_protocol::runner_status::RunnerStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oac-tree-run")]
#[command(version, about = "Run oac-tree procedures without the GUI", long_about = None)]
struct Cli {
    /// Project root containing `.oac-tree-gui/`
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the procedures found in the project
    List,
    /// Run a procedure with the simulated runtime
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Procedure name
    name: String,

    /// Delay between steps in milliseconds, overriding `tick_timeout_msec`
    #[arg(long)]
    delay: Option<u64>,

    /// Option index sent for every user choice
    #[arg(long, default_value_t = 0)]
    choice: usize,

    /// JSON value sent for every user input
    #[arg(long, default_value = "null")]
    input: String,

    /// Instruction indices to report and continue from
    #[arg(long, value_delimiter = ',')]
    breakpoints: Vec<u32>,

    /// Also print instruction status changes
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.root).await?;

    match cli.command {
        Command::List => {
            list_procedures(&config);
            Ok(())
        }
        Command::Run(args) => match run_procedure(config, &args).await? {
            RunnerStatus::Succeeded => Ok(()),
            status => bail!("procedure '{}' ended as {status}", args.name),
        },
    }
}

fn list_procedures(config: &AppConfig) {
    if config.procedures.is_empty() {
        println!("No procedures found");
        return;
    }
    for procedure in &config.procedures {
        println!(
            "{} ({} instructions, {} variables)",
            procedure.name,
            procedure.instruction_count(),
            procedure.variables.len()
        );
    }
}

async fn run_procedure(config: AppConfig, args: &RunArgs) -> Result<RunnerStatus> {
    let procedure = config
        .procedure(&args.name)
        .cloned()
        .ok_or_else(|| eyre!("no procedure named '{}'", args.name))?;

    let registry = Arc::new(DomainRegistry::from_config(&config.global));
    let factory: Arc<dyn RuntimeFactory> = Arc::new(ScriptFactory::from_procedures());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut manager = JobManager::new(registry, factory, config.global, events_tx);

    let id = manager.submit_job(procedure)?;
    if let Some(delay) = args.delay {
        manager.change_delay(id, delay)?;
    }
    for index in &args.breakpoints {
        manager.set_breakpoint(id, *index)?;
    }
    manager.set_active_job(Some(id))?;
    manager.start(id)?;

    loop {
        while let Ok(event) = events_rx.try_recv() {
            render::print_event(&event, args.verbose);
            match event {
                Event::UserChoiceRequested { request_id, .. } => {
                    let result = UserChoiceResult {
                        index: args.choice,
                        processed: true,
                    };
                    manager.answer_user_choice(id, request_id, result)?;
                }
                Event::UserInputRequested { request_id, .. } => {
                    let result = UserInputResult {
                        value: args.input.clone(),
                        processed: true,
                    };
                    manager.answer_user_input(id, request_id, result)?;
                }
                Event::BreakpointHit { .. } => manager.start(id)?,
                _ => {}
            }
        }

        let done = manager
            .job(id)
            .map_or(true, |job| job.status().is_finished() && !job.has_worker());
        if done || !manager.next_event().await {
            break;
        }
    }

    let status = manager
        .job(id)
        .map(JobContext::status)
        .ok_or_else(|| eyre!("job {id} vanished"))?;
    manager.shutdown().await;
    render::print_summary(&args.name, status);
    Ok(status)
}
