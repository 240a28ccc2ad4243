//! engine::changes
//!
//! Pending change sets and tree composition.
//!
//! A [`PendingChangeSet`] is the unit of atomic mutation: every upsert and
//! deletion in it lands in one commit or not at all. [`compose`] turns a
//! base tree plus written blobs and deletions into the tree update sent to
//! the store. Composition is pure; untouched paths are inherited from the
//! base tree by the store.

use std::collections::{BTreeMap, BTreeSet};

use super::error::OpError;
use crate::core::types::{ContentPath, Oid};
use crate::forge::TreeItem;

/// Largest content accepted for a single path, in bytes.
pub const MAX_CONTENT_BYTES: usize = 2 * 1024 * 1024;

/// Upserts and deletions to apply together.
///
/// A path is never both upserted and deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangeSet {
    message: String,
    upserts: BTreeMap<ContentPath, Vec<u8>>,
    deletions: BTreeSet<ContentPath>,
}

impl PendingChangeSet {
    /// Create an empty change set with a commit message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            upserts: BTreeMap::new(),
            deletions: BTreeSet::new(),
        }
    }

    /// Write `content` at `path`.
    ///
    /// # Errors
    ///
    /// Validation error if `content` exceeds [`MAX_CONTENT_BYTES`] or
    /// `path` is already scheduled for deletion.
    pub fn upsert(
        &mut self,
        path: ContentPath,
        content: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, OpError> {
        let content = content.into();
        if content.len() > MAX_CONTENT_BYTES {
            return Err(OpError::validation(format!(
                "{path} is {} bytes; the limit is {MAX_CONTENT_BYTES}",
                content.len()
            )));
        }
        if self.deletions.contains(&path) {
            return Err(OpError::validation(format!(
                "{path} cannot be both written and deleted"
            )));
        }
        self.upserts.insert(path, content);
        Ok(self)
    }

    /// Remove `path`.
    ///
    /// # Errors
    ///
    /// Validation error if `path` is already scheduled for writing.
    pub fn delete(&mut self, path: ContentPath) -> Result<&mut Self, OpError> {
        if self.upserts.contains_key(&path) {
            return Err(OpError::validation(format!(
                "{path} cannot be both written and deleted"
            )));
        }
        self.deletions.insert(path);
        Ok(self)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn upserts(&self) -> &BTreeMap<ContentPath, Vec<u8>> {
        &self.upserts
    }

    pub fn deletions(&self) -> &BTreeSet<ContentPath> {
        &self.deletions
    }

    /// Whether the set changes nothing.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }

    /// Number of paths touched.
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletions.len()
    }
}

/// Tree update relative to a base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDescription {
    /// Tree the items apply to
    pub base_tree: Oid,
    /// Upserts first, then deletions, each in path order
    pub items: Vec<TreeItem>,
}

/// Describe the tree that results from applying `written` and
/// `deletions` to `base_tree`.
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use logshelf::core::types::{ContentPath, Oid};
/// use logshelf::engine::changes::compose;
///
/// let base = Oid::new("1".repeat(40)).unwrap();
/// let blob = Oid::new("2".repeat(40)).unwrap();
/// let written = BTreeMap::from([(ContentPath::index_html(), blob)]);
/// let deletions = BTreeSet::from([ContentPath::new("log/b.html").unwrap()]);
///
/// let tree = compose(&base, &written, &deletions);
/// assert_eq!(tree.items.len(), 2);
/// assert!(tree.items[1].is_deletion());
/// ```
pub fn compose(
    base_tree: &Oid,
    written: &BTreeMap<ContentPath, Oid>,
    deletions: &BTreeSet<ContentPath>,
) -> TreeDescription {
    let items = written
        .iter()
        .map(|(path, blob)| TreeItem::upsert(path, blob.clone()))
        .chain(deletions.iter().map(TreeItem::delete))
        .collect();

    TreeDescription {
        base_tree: base_tree.clone(),
        items,
    }
}
