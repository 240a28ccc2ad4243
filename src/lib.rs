//! logshelf - Publish and curate a log index on a GitHub Pages repository
//!
//! A log index is an HTML page whose list region names the published logs.
//! Every change (adding a log, deleting one, reordering the list) lands as
//! one atomic commit on the repository's branch, and the list region stays
//! in step with the files it points to.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Operations, the commit pipeline, and the build poller
//! - [`listing`] - List region codec and host page markup
//! - [`forge`] - Object store abstraction (GitHub, in-memory mock)
//! - [`core`] - Domain types and configuration
//! - [`auth`] - Bearer token providers
//! - [`ui`] - User-facing output
//! - [`telemetry`] - Tracing subscriber setup
//!
//! # Correctness Invariants
//!
//! 1. A branch moves only by compare-and-swap against the head it was read at
//! 2. One operation produces at most one commit
//! 3. Markup outside the list region is preserved byte for byte
//! 4. Invalid input is rejected before the store is contacted

pub mod auth;
pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod listing;
pub mod telemetry;
pub mod ui;
