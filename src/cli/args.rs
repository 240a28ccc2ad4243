//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--owner` / `--repo`: Target repository (or `LOGSHELF_OWNER` / `LOGSHELF_REPO`)
//! - `--token`: API token (or `GITHUB_TOKEN`)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// logshelf - Publish and curate a log index on a GitHub Pages repository
#[derive(Parser, Debug)]
#[command(name = "logshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository owner; must be the authenticated user
    #[arg(long, global = true, env = "LOGSHELF_OWNER")]
    pub owner: Option<String>,

    /// Repository name
    #[arg(long, global = true, env = "LOGSHELF_REPO")]
    pub repo: Option<String>,

    /// API token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish a new list order and delete logs, in one commit
    #[command(
        name = "apply",
        long_about = "Publish a new list order and delete logs, in one commit.\n\n\
            The list region of the index is rewritten to exactly the --order \
            identifiers that are not also passed to --delete. Content of every \
            --delete path that exists is removed in the same commit.",
        after_help = "\
EXAMPLES:
    # Move b above a
    logshelf apply --order log/b.html,log/a.html

    # Drop c from the list and the repository
    logshelf apply --order log/b.html,log/a.html --delete log/c.html"
    )]
    Apply {
        /// Entry identifiers in their new order
        #[arg(long, value_delimiter = ',')]
        order: Vec<String>,

        /// Paths to delete
        #[arg(long, value_delimiter = ',')]
        delete: Vec<String>,
    },

    /// Delete one log and its entry
    #[command(
        name = "delete",
        after_help = "\
EXAMPLES:
    logshelf delete log/2024-01-02.html"
    )]
    Delete {
        /// Content path of the log
        path: String,
    },

    /// Upload a log and list it, newest first
    #[command(
        name = "add",
        long_about = "Upload a log and list it, newest first.\n\n\
            Fails with ALREADY_EXISTS if the path is taken. Companion scripts \
            missing beside the index are published in the same commit.",
        after_help = "\
EXAMPLES:
    logshelf add log/run-42.html --file ./run-42.html --label 'Run 42' --scenario smoke

    # Add robots meta and script, then wait for the site to rebuild
    logshelf add log/run-43.html --file ./run-43.html --prepare --wait"
    )]
    Add {
        /// Content path for the log
        path: String,

        /// Local file to upload
        #[arg(long, short)]
        file: PathBuf,

        /// Link text; defaults to the file name
        #[arg(long, default_value = "")]
        label: String,

        /// Muted label shown before the link
        #[arg(long, default_value = "")]
        scenario: String,

        /// Inject the robots meta tag, font style, and robots script
        #[arg(long)]
        prepare: bool,

        /// Wait for the site build of the new commit
        #[arg(long)]
        wait: bool,
    },

    /// Publish the default index page and companion scripts
    #[command(name = "init")]
    Init {
        /// Wait for the site build of the new commit
        #[arg(long)]
        wait: bool,
    },

    /// Show the latest site build
    #[command(
        name = "status",
        after_help = "\
EXAMPLES:
    logshelf status
    logshelf status --commit \"$(git rev-parse HEAD)\" --wait --max-attempts 60"
    )]
    Status {
        /// Full SHA of the commit the build must be made from
        #[arg(long)]
        commit: Option<String>,

        /// Poll until the build is live or errors
        #[arg(long)]
        wait: bool,

        /// Stop waiting after this many checks
        #[arg(long, requires = "wait")]
        max_attempts: Option<u32>,
    },
}
