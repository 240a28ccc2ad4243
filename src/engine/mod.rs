//! engine
//!
//! Turns curation requests into single atomic commits.
//!
//! # Architecture
//!
//! ```text
//! LogShelf operation -> validate -> Publisher::publish(planner)
//!     resolve branch -> read ref -> read base tree -> plan
//!     -> write blobs -> compose tree -> create commit -> update ref
//! ```
//!
//! - [`ops`]: the public operations and their planners
//! - [`pipeline`]: the staged publish against an [`ObjectStore`](crate::forge::ObjectStore)
//! - [`changes`]: pending change sets and tree composition
//! - [`poller`]: waiting for a commit to go live
//! - [`error`]: the error taxonomy and structured outcomes
//!
//! # Invariants
//!
//! - The branch moves at most once per operation, by compare-and-swap.
//! - Validation failures never contact the store.
//! - Concurrent writers lose with `CONFLICT`; nothing is merged silently.

pub mod changes;
pub mod error;
pub mod ops;
pub mod pipeline;
pub mod poller;

pub use changes::{PendingChangeSet, MAX_CONTENT_BYTES};
pub use error::{ErrorKind, OpError, OpOutcome};
pub use ops::{Clock, LogShelf, NewLog};
pub use pipeline::{ChangePlanner, PublishRequest, PublishStage, Published, Publisher};
pub use poller::{BuildPoller, PollHandle, PollOutcome};
