//! add command - Upload a log and list it
//!
//! # Algorithm
//!
//! 1. Read the local file
//! 2. Upload it, insert its entry newest-first, and publish any missing
//!    companion scripts, as one commit
//! 3. Optionally wait for the site build of that commit

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::{finish, Session};
use crate::cli::Context;
use crate::engine::NewLog;
use crate::listing::page;
use crate::ui::output;

/// Arguments of the add command.
#[derive(Debug)]
pub struct AddArgs {
    pub path: String,
    pub file: PathBuf,
    pub label: String,
    pub scenario: String,
    pub prepare: bool,
    pub wait: bool,
}

/// Upload a log.
pub async fn add(ctx: &Context, session: &Session, args: AddArgs) -> Result<ExitCode> {
    let content = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    if args.prepare && !page::has_head_close(&content) {
        output::warn(
            format!("{} has no </head>; uploading it unprepared", args.file.display()),
            ctx.verbosity,
        );
    }

    let log = NewLog::new(args.path, content)
        .label(args.label)
        .scenario(args.scenario)
        .prepared(args.prepare);
    let outcome = session.shelf.add_one(&session.scope, log).await;
    finish(ctx, session, outcome, args.wait).await
}
