use std::io::BufRead;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use temoa_core::CoreError;
use temoa_desk::cli::Cli;
use temoa_desk::{DeskConfig, RunDefaults, RunOrchestrator, TerminalFrontend};
use temoa_events::LogRelay;
use temoa_worker::JobRunner;

const HELP: &str = "Commands: run | log | up | down | end | status | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "temoa_desk=info,temoa_serve=info,temoa_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- Configuration ---
    let cli = Cli::parse();
    let config = DeskConfig::from_env();
    tracing::info!(
        config = %cli.config.display(),
        program = %config.program,
        "Loaded desk configuration"
    );

    let defaults = RunDefaults {
        config_path: cli.config.clone(),
        output_root: cli.output_root.clone().or_else(|| config.output_root.clone()),
        silent: config.silent,
    };
    let overrides = cli.overrides();

    // --- Orchestrator ---
    let (relay, mut events) = LogRelay::channel();
    let runner = JobRunner::new(config.computation());
    let frontend = TerminalFrontend::new(std::io::stdout(), config.log_view_rows);
    let mut orchestrator =
        RunOrchestrator::new(frontend, runner, relay, defaults, config.readiness());

    if cli.once {
        orchestrator.submit_run(overrides.clone())?;
    } else {
        orchestrator.collaborator_mut().notice(HELP);
    }

    // --- Interactive loop ---
    let mut commands = spawn_command_reader();
    let mut stdin_open = !cli.once;

    loop {
        tokio::select! {
            Some(event) = events.recv() => orchestrator.handle(event).await,

            command = commands.recv(), if stdin_open => match command {
                Some(command) => match command.trim() {
                    "" => {}
                    "run" | "r" => match orchestrator.submit_run(overrides.clone()) {
                        Ok(_) => {}
                        Err(CoreError::RunInProgress) => {
                            orchestrator.collaborator_mut().notice("A run is already in progress");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Could not start run");
                        }
                    },
                    "log" | "l" => orchestrator.collaborator_mut().redraw(),
                    "up" | "u" => {
                        let frontend = orchestrator.collaborator_mut();
                        frontend.view_mut().scroll_up(config.log_view_rows);
                        frontend.redraw();
                    }
                    "down" | "d" => {
                        let frontend = orchestrator.collaborator_mut();
                        frontend.view_mut().scroll_down(config.log_view_rows);
                        frontend.redraw();
                    }
                    "end" | "e" => {
                        let frontend = orchestrator.collaborator_mut();
                        frontend.view_mut().scroll_to_bottom();
                        frontend.redraw();
                    }
                    "status" | "s" => {
                        let status = format!("State: {:?}", orchestrator.state());
                        orchestrator.collaborator_mut().notice(&status);
                    }
                    "quit" | "q" => break,
                    other => {
                        let message = format!("Unknown command {other:?}. {HELP}");
                        orchestrator.collaborator_mut().notice(&message);
                    }
                },
                None => stdin_open = false,
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // --- Shutdown ---
    tracing::info!("Shutting down");
    orchestrator.shutdown().await;
    Ok(())
}

/// Read commands on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_command_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
