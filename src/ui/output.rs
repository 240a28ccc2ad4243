//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, results are printed as one JSON document on
//! stdout and human-oriented messages are suppressed.

use std::fmt::Display;

use serde::Serialize;

use crate::engine::{OpOutcome, PollOutcome};
use crate::forge::{BuildInfo, BuildStatus};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a value as pretty JSON on stdout.
pub fn json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line summary of an operation result.
pub fn format_outcome(outcome: &OpOutcome) -> String {
    match outcome {
        OpOutcome::Committed { commit } => format!("committed {}", commit.short(7)),
        OpOutcome::Failed(err) => format!("{}: {}", err.kind(), err.message()),
    }
}

/// One-line summary of a poll result.
pub fn format_poll(outcome: &PollOutcome) -> String {
    match outcome {
        PollOutcome::Live(build) => match &build.commit {
            Some(commit) => format!("live at {}", short(commit)),
            None => "live".to_string(),
        },
        PollOutcome::Errored(build) => match &build.commit {
            Some(commit) => format!("build errored at {}", short(commit)),
            None => "build errored".to_string(),
        },
        PollOutcome::Cancelled => "cancelled".to_string(),
        PollOutcome::GaveUp { attempts, last } => match last {
            Some(build) => format!("still {} after {attempts} checks", build.status),
            None => format!("no build status after {attempts} checks"),
        },
        PollOutcome::Failed(err) => format!("build status unavailable: {err}"),
    }
}

/// JSON shape of a build query or poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// `live`, `errored`, `pending`, `cancelled`, `gave_up` or `failed`
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BuildStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildReport {
    fn new(state: &'static str, build: Option<&BuildInfo>) -> Self {
        Self {
            state,
            status: build.map(|b| b.status),
            commit: build.and_then(|b| b.commit.clone()),
            attempts: None,
            error: None,
        }
    }
}

impl From<&BuildInfo> for BuildReport {
    fn from(build: &BuildInfo) -> Self {
        let state = match build.status {
            BuildStatus::Built => "live",
            BuildStatus::Errored => "errored",
            BuildStatus::Queued | BuildStatus::Building => "pending",
        };
        Self::new(state, Some(build))
    }
}

impl From<&PollOutcome> for BuildReport {
    fn from(outcome: &PollOutcome) -> Self {
        match outcome {
            PollOutcome::Live(build) => Self::new("live", Some(build)),
            PollOutcome::Errored(build) => Self::new("errored", Some(build)),
            PollOutcome::Cancelled => Self::new("cancelled", None),
            PollOutcome::GaveUp { attempts, last } => Self {
                attempts: Some(*attempts),
                ..Self::new("gave_up", last.as_ref())
            },
            PollOutcome::Failed(err) => Self {
                error: Some(err.to_string()),
                ..Self::new("failed", None)
            },
        }
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
