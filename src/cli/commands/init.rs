//! init command - Publish the default index page

use std::process::ExitCode;

use anyhow::Result;

use super::{finish, Session};
use crate::cli::Context;

/// Publish the default index page and companion scripts.
///
/// Fails with ALREADY_EXISTS when the index is already present.
pub async fn init(ctx: &Context, session: &Session, wait: bool) -> Result<ExitCode> {
    let outcome = session.shelf.initialize(&session.scope).await;
    finish(ctx, session, outcome, wait).await
}
