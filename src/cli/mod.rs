//! CLI interface for poly-updown
//!
//! Provides subcommands for:
//! - `run`: Start the execution engine
//! - `status`: Show the last persisted engine state
//! - `config`: Show the loaded configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-updown")]
#[command(about = "Autonomous execution engine for 15-minute crypto up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the execution engine
    Run(RunArgs),
    /// Show the last persisted engine state
    Status,
    /// Show the loaded configuration
    Config,
}
