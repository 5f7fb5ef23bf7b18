//! Command-line interface for strictly_rpg.

use clap::{Parser, Subcommand};

/// Strictly RPG - turn client for the multi-agent game engine
#[derive(Parser, Debug)]
#[command(name = "strictly_rpg")]
#[command(about = "Play turns against a multi-agent RPG engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the client config file
    #[arg(short, long, default_value = "strictly_rpg.toml")]
    pub config: std::path::PathBuf,

    /// Engine URL (overrides config and environment)
    #[arg(long)]
    pub server_url: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play interactively, resuming the saved session if there is one
    Play,

    /// Start a new session and play it
    New {
        /// Optional starting context for the game
        #[arg(default_value = "")]
        context: String,
    },

    /// Load an existing session and play it
    Load {
        /// Session ID to load
        session_id: String,
    },
}
