//! listing
//!
//! The ordered list region of the host document.
//!
//! # Modules
//!
//! - [`markers`] - Tags and attributes that delimit the region
//! - [`entry`] - One list item and its markup
//! - [`codec`] - Extract, render, merge, insert, remove
//! - [`page`] - Default document, loader bootstrap, log preparation, assets
//!
//! # Invariants
//!
//! - Bytes outside the region are never altered
//! - Identifiers within a region are unique after any rewrite
//! - Rewrites are pure functions of their inputs

pub mod codec;
pub mod entry;
pub mod markers;
pub mod page;

pub use codec::{CodecError, ListCodec};
pub use entry::Entry;
pub use markers::ListMarkers;
