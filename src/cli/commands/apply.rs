//! apply command - Publish a new list order and deletions
//!
//! The list region is rewritten to exactly the `--order` identifiers that
//! are not in `--delete`; existing `--delete` paths are removed from the
//! repository in the same commit.

use std::process::ExitCode;

use anyhow::Result;

use super::{report, Session};
use crate::cli::Context;

/// Apply a reorder and deletions.
///
/// # Arguments
///
/// * `ctx` - Output context
/// * `session` - Connected repository
/// * `order` - Entry identifiers in their new order
/// * `deletes` - Paths to delete
pub async fn apply(
    ctx: &Context,
    session: &Session,
    order: &[String],
    deletes: &[String],
) -> Result<ExitCode> {
    let outcome = session
        .shelf
        .apply_reorder_and_deletes(&session.scope, order, deletes)
        .await;
    report(ctx, &outcome)
}
