//! Strictly RPG - interactive turn client
//!
//! Talks to a running multi-agent game engine over HTTP.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::io::Write;
use std::sync::Arc;
use strictly_rpg::{
    ClientConfig, DisplayEvent, HttpEngine, JsonFileStore, ProgressSnapshot, Submission,
    TurnCoordinator, TurnError, render_event, render_progress,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

const HELP: &str = "Commands:
  /new [context]  start a new game
  /load <id>      load an existing session
  /end            delete the current session on the engine
  /clear          forget the current session locally
  /help           show this help
  /quit           exit
Anything else is submitted as your turn.";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load_or_default(&cli.config)?.apply_env();
    if let Some(url) = cli.server_url {
        config = config.with_server_url(url);
    }

    run(config, cli.command).await
}

/// Builds the coordinator and runs the interactive loop.
#[instrument(skip_all, fields(server_url = %config.server_url()))]
async fn run(config: ClientConfig, command: Command) -> Result<()> {
    info!("Starting Strictly RPG client");

    let store = JsonFileStore::open(config.state_path())
        .with_context(|| format!("Failed to open {}", config.state_path().display()))?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    tokio::spawn(print_progress(progress_rx));

    let coordinator = TurnCoordinator::new(
        Arc::new(HttpEngine::new(config.server_url())),
        Arc::new(store),
        events_tx,
        progress_tx,
    )
    .with_poll_interval(config.poll_interval());

    let startup = match command {
        Command::Play => coordinator.restore_saved().await.map(|_| ()),
        Command::New { context } => coordinator.create_session(&context).await.map(|_| ()),
        Command::Load { session_id } => coordinator.load_session(&session_id).await.map(|_| ()),
    };
    if let Err(e) = startup {
        eprintln!("{}", e);
    }
    drain(&mut events_rx);
    print_status(&coordinator);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('/') {
            let (verb, arg) = rest.split_once(' ').unwrap_or((rest, ""));
            let result = match verb {
                "quit" | "exit" => break,
                "help" => {
                    println!("{}", HELP);
                    Ok(())
                }
                "new" => coordinator.create_session(arg).await.map(|_| ()),
                "load" if !arg.trim().is_empty() => {
                    coordinator.load_session(arg).await.map(|_| ())
                }
                "end" => coordinator.delete_session().await,
                "clear" => coordinator.clear_session(),
                _ => {
                    println!("Unknown command. {}", HELP);
                    Ok(())
                }
            };
            if let Err(e) = result {
                eprintln!("{}", e);
            }
        } else {
            match coordinator.submit(line).await {
                Ok(Submission::Skipped(reason)) => println!("Not submitted: {}", reason),
                Ok(Submission::Resolved(_)) => {}
                Err(TurnError::Validation(e)) => println!("{}", e),
                Err(e) => warn!(error = %e, "Turn failed"),
            }
        }

        drain(&mut events_rx);
        print_status(&coordinator);
    }

    info!("Exiting");
    Ok(())
}

fn drain(events: &mut mpsc::UnboundedReceiver<DisplayEvent>) {
    while let Ok(event) = events.try_recv() {
        println!("{}\n", render_event(&event));
    }
}

fn print_status(coordinator: &TurnCoordinator) {
    match coordinator.current_session() {
        Some(session) if coordinator.is_game_over() => {
            println!("Session {} has ended. Start a new game with /new.", session.id());
        }
        Some(session) => println!("Session: {} ({})", session.id(), coordinator.state()),
        None => println!("No active session. Use /new or /load <id>."),
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

async fn print_progress(mut progress: mpsc::UnboundedReceiver<ProgressSnapshot>) {
    while let Some(snapshot) = progress.recv().await {
        eprintln!("{}", render_progress(&snapshot));
    }
}
