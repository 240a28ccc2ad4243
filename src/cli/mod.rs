//! cli
//!
//! Command-line interface layer for logshelf.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Build the store, capability, and façade for the target repository
//! - Delegate to command handlers and report their outcome
//!
//! # Architecture
//!
//! The CLI layer is thin. Every mutation goes through
//! [`LogShelf`](crate::engine::LogShelf); the CLI only formats the
//! [`OpOutcome`](crate::engine::OpOutcome) it gets back.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use std::process::ExitCode;

use anyhow::Result;

use crate::telemetry;
use crate::ui::output::Verbosity;

/// Output settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub verbosity: Verbosity,
    pub json: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbosity: Verbosity::from_flags(cli.quiet || cli.json, cli.debug),
            json: cli.json,
        }
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    telemetry::init(cli.debug);
    commands::dispatch(cli)
}
