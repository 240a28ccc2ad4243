//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity, text summaries, and JSON output
//!
//! Diagnostics go through `tracing` on stderr; results go through this
//! module on stdout.

pub mod output;
