//! status command - Show the latest site build
//!
//! Without `--wait` this is a single query. With `--wait` it polls until the
//! build is live (for `--commit`, when given) or errors, or until
//! `--max-attempts` checks have been made.

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::Session;
use crate::cli::Context;
use crate::forge::{BuildStatus, BuildStatusSource};
use crate::ui::output::{self, BuildReport};

/// Show or wait for the latest site build.
pub async fn status(
    ctx: &Context,
    session: &Session,
    commit: Option<String>,
    wait: bool,
    max_attempts: Option<u32>,
) -> Result<ExitCode> {
    let repo = session.scope.repo();

    if !wait {
        let build = session
            .store
            .latest_build(repo)
            .await
            .context("failed to read the latest build")?;
        if ctx.json {
            output::json(&BuildReport::from(&build))?;
        } else {
            let at = build.commit.as_deref().unwrap_or("-");
            output::print(format!("{} at {at}", build.status), ctx.verbosity);
        }
        return Ok(if build.status == BuildStatus::Errored {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    let polled = session
        .poller(max_attempts)
        .spawn(repo.clone(), commit)
        .join()
        .await;
    if ctx.json {
        output::json(&BuildReport::from(&polled))?;
    } else if polled.is_live() {
        output::print(output::format_poll(&polled), ctx.verbosity);
    } else {
        output::error(output::format_poll(&polled));
    }
    Ok(if polled.is_live() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
