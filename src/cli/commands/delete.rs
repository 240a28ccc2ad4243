//! delete command - Delete one log
//!
//! Removes the content and its list entry in a single commit. A path that
//! does not exist fails with NOT_FOUND and changes nothing.

use std::process::ExitCode;

use anyhow::Result;

use super::{report, Session};
use crate::cli::Context;

/// Delete the log at `path`.
pub async fn delete(ctx: &Context, session: &Session, path: &str) -> Result<ExitCode> {
    let outcome = session.shelf.delete_one(&session.scope, path).await;
    report(ctx, &outcome)
}
