//! forge
//!
//! Remote object store and build status.
//!
//! # Modules
//!
//! - `traits`: [`ObjectStore`], [`BuildStatusSource`] and their value types
//! - [`github`]: GitHub implementation using the REST git data API
//! - [`mock`]: In-memory implementation for deterministic testing
//!
//! Store failures never leave a branch half-updated: the only mutating call
//! that moves a branch is [`ObjectStore::update_ref`], and it either
//! fast-forwards or fails.

pub mod github;
pub mod mock;
mod traits;

pub use traits::{
    BuildInfo, BuildStatus, BuildStatusSource, CommitAuthor, CommitInfo, FileContent, NewCommit,
    ObjectStore, StoreError, TreeItem, BLOB_MODE,
};
