//! Command-line interface for the listing indexer.

pub mod commands;
pub mod output;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::models::OutputFormat;

/// Incrementally index real-estate listings into a vector store.
#[derive(Debug, Parser)]
#[command(name = "estate-indexer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "ESTATE_INDEXER_CONFIG",
        help = "Path to a configuration file"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, short = 'f', global = true, value_enum, help = "Output format")]
    pub format: Option<OutputFormat>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v debug, -vv trace)"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index every eligible listing that is not in the vector store yet
    Run(commands::RunArgs),

    /// Check the embedding provider, vector store and analytical store
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
