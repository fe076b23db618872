//! Command-line interface for dsvc.

pub mod args;
mod commands;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::app::{App, AppError};

pub use args::{GlobalArgs, InputSource, OutputSink};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument processing error.
    #[error("{0}")]
    Args(#[from] args::ArgsError),

    /// App error.
    #[error("{0}")]
    App(#[from] AppError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// dsvc - versioned datasets with working directory checkouts.
#[derive(Parser, Debug)]
#[command(name = "dsvc", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a dataset out into a new working directory.
    Checkout(commands::fsi::CheckoutArgs),

    /// Compare a working directory against its dataset's head.
    Status(commands::fsi::StatusArgs),

    /// Overwrite working directory files from a snapshot.
    Restore(commands::fsi::RestoreArgs),

    /// Link an existing directory to a dataset.
    Link(commands::fsi::LinkArgs),

    /// Remove a working directory link.
    Unlink(commands::fsi::UnlinkArgs),

    /// Create a new dataset in a working directory.
    Init(commands::fsi::InitArgs),

    /// Commit a working directory as a new version.
    Save(commands::fsi::SaveArgs),

    /// Write a dataset document into a linked working directory.
    Write(commands::fsi::WriteArgs),

    /// Load and print a dataset.
    Get(commands::dataset::GetArgs),

    /// Resolve a reference to its head version.
    Resolve(commands::dataset::ResolveArgs),

    /// Show version history.
    Log(commands::dataset::LogArgs),
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let app = App::new(self.global.to_app_context())?;
        let global = &self.global;

        match self.command {
            Command::Checkout(args) => args.run(&app, global).await,
            Command::Status(args) => args.run(&app, global).await,
            Command::Restore(args) => args.run(&app, global).await,
            Command::Link(args) => args.run(&app, global).await,
            Command::Unlink(args) => args.run(&app, global).await,
            Command::Init(args) => args.run(&app, global).await,
            Command::Save(args) => args.run(&app, global).await,
            Command::Write(args) => args.run(&app, global).await,
            Command::Get(args) => args.run(&app, global).await,
            Command::Resolve(args) => args.run(&app, global).await,
            Command::Log(args) => args.run(&app, global).await,
        }
    }
}
