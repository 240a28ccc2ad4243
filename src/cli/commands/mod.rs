//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Reads any local input (the log file for `add`)
//! 2. Calls one [`LogShelf`] operation or queries the build status
//! 3. Formats and displays the outcome
//!
//! Handlers do NOT talk to the store directly, except `status` which only
//! reads the build status.
//!
//! # Async Commands
//!
//! Every command involves network I/O. The dispatch function builds a
//! tokio runtime and blocks on the selected handler.

mod add;
mod apply;
mod delete;
mod init;
mod status;

pub use add::add;
pub use apply::apply;
pub use delete::delete;
pub use init::init;
pub use status::status;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use reqwest::Url;
use serde::Serialize;

use crate::auth::{StaticTokenProvider, TokenProvider};
use crate::cli::args::{Cli, Command};
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::types::RepoScope;
use crate::engine::{BuildPoller, LogShelf, OpOutcome};
use crate::forge::github::GitHubStore;
use crate::ui::output::{self, BuildReport};

/// Dispatch a command to its handler.
pub fn dispatch(cli: Cli) -> Result<ExitCode> {
    let ctx = Context::from_cli(&cli);
    let config = Config::load()?;
    let owner = cli
        .owner
        .ok_or_else(|| anyhow!("--owner is required (or set LOGSHELF_OWNER)"))?;
    let repo = cli
        .repo
        .ok_or_else(|| anyhow!("--repo is required (or set LOGSHELF_REPO)"))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let session = match Session::connect(&config, &owner, &repo, cli.token).await? {
            Ok(session) => session,
            Err(denied) => return report(&ctx, &denied),
        };

        match cli.command {
            Command::Apply { order, delete } => apply::apply(&ctx, &session, &order, &delete).await,
            Command::Delete { path } => delete::delete(&ctx, &session, &path).await,
            Command::Add {
                path,
                file,
                label,
                scenario,
                prepare,
                wait,
            } => {
                let args = add::AddArgs {
                    path,
                    file,
                    label,
                    scenario,
                    prepare,
                    wait,
                };
                add::add(&ctx, &session, args).await
            }
            Command::Init { wait } => init::init(&ctx, &session, wait).await,
            Command::Status {
                commit,
                wait,
                max_attempts,
            } => status::status(&ctx, &session, commit, wait, max_attempts).await,
        }
    })
}

/// Everything a handler needs to act on one repository.
#[derive(Debug)]
pub struct Session {
    pub store: Arc<GitHubStore>,
    pub scope: RepoScope,
    pub shelf: LogShelf,
    pub poll_interval: Duration,
}

impl Session {
    /// Authenticate and bind the caller to `owner/repo`.
    ///
    /// The inner `Err` is an owner mismatch or invalid repository, reported
    /// like any other operation outcome.
    pub async fn connect(
        config: &Config,
        owner: &str,
        repo: &str,
        token: Option<String>,
    ) -> Result<std::result::Result<Self, OpOutcome>> {
        let host = Url::parse(config.api_base())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| config.api_base().to_string());
        let provider = Arc::new(StaticTokenProvider::new(host, token));
        if !provider.is_authenticated() {
            return Err(anyhow!("no API token; pass --token or set GITHUB_TOKEN"));
        }

        let store = Arc::new(GitHubStore::with_api_base(provider, config.api_base()));
        let login = store
            .current_user()
            .await
            .context("failed to identify the token's user")?;
        tracing::debug!(login = %login, "authenticated");

        let scope = match RepoScope::authorize(login, owner, repo) {
            Ok(scope) => scope,
            Err(e) => return Ok(Err(OpOutcome::Failed(e.into()))),
        };
        let shelf = LogShelf::from_config(store.clone(), config)?;

        Ok(Ok(Self {
            store,
            scope,
            shelf,
            poll_interval: config.poll_interval(),
        }))
    }

    /// A build poller for this repository.
    pub fn poller(&self, max_attempts: Option<u32>) -> BuildPoller {
        let poller = BuildPoller::new(self.store.clone(), self.poll_interval);
        match max_attempts {
            Some(max) => poller.with_max_attempts(max),
            None => poller,
        }
    }
}

/// Print an operation outcome and map it to an exit code.
pub(crate) fn report(ctx: &Context, outcome: &OpOutcome) -> Result<ExitCode> {
    if ctx.json {
        output::json(outcome)?;
    } else if outcome.is_ok() {
        output::print(output::format_outcome(outcome), ctx.verbosity);
    } else {
        output::error(output::format_outcome(outcome));
    }
    Ok(exit_code(outcome.is_ok()))
}

/// Report `outcome`, then wait for its build when asked to.
pub(crate) async fn finish(
    ctx: &Context,
    session: &Session,
    outcome: OpOutcome,
    wait: bool,
) -> Result<ExitCode> {
    if !wait || !outcome.is_ok() {
        return report(ctx, &outcome);
    }

    if !ctx.json {
        output::print(output::format_outcome(&outcome), ctx.verbosity);
        output::print("waiting for the site build", ctx.verbosity);
    }
    let commit = outcome.commit().map(ToString::to_string);
    let polled = session
        .poller(None)
        .spawn(session.scope.repo().clone(), commit)
        .join()
        .await;

    if ctx.json {
        output::json(&Waited {
            outcome: &outcome,
            build: BuildReport::from(&polled),
        })?;
    } else if polled.is_live() {
        output::print(output::format_poll(&polled), ctx.verbosity);
    } else {
        output::error(output::format_poll(&polled));
    }
    Ok(exit_code(polled.is_live()))
}

#[derive(Serialize)]
struct Waited<'a> {
    #[serde(flatten)]
    outcome: &'a OpOutcome,
    build: BuildReport,
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
