//! forge::traits
//!
//! Object store and build status traits.
//!
//! # Design
//!
//! The store exposes the primitives of a content-addressed versioned
//! store: branch heads, commits, trees, and blobs. Publishing is built
//! from these in [`crate::engine::pipeline`]; the store itself knows
//! nothing about documents or list regions.
//!
//! [`ObjectStore::update_ref`] is the only mutating call that can observe
//! a race. It must fail with [`StoreError::Conflict`] when the branch no
//! longer points at the expected commit.
//!
//! # Example
//!
//! ```
//! use logshelf::core::types::{BranchName, RepoRef};
//! use logshelf::forge::mock::MockStore;
//! use logshelf::forge::ObjectStore;
//!
//! # tokio_test::block_on(async {
//! let repo = RepoRef::new("alice", "logs").unwrap();
//! let main = BranchName::new("main").unwrap();
//! let store = MockStore::new().with_repo(&repo, &main, &[("index.html", "<html></html>")]);
//!
//! let head = store.read_ref(&repo, &main).await.unwrap();
//! let commit = store.read_commit(&repo, &head).await.unwrap();
//! assert_eq!(commit.sha, head);
//! # });
//! ```

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::{BranchName, ContentPath, Oid, RepoRef};

/// Errors from object store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The branch moved since it was read.
    #[error("branch '{branch}' moved since it was read")]
    Conflict {
        /// Branch whose update was rejected
        branch: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::RateLimited | StoreError::NetworkError(_) => true,
            StoreError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// File mode of every blob this crate writes.
pub const BLOB_MODE: &str = "100644";

/// One entry in a tree update.
///
/// `sha: None` removes `path` from the resulting tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeItem {
    /// Path relative to the repository root
    pub path: String,
    /// Git file mode
    pub mode: &'static str,
    /// Object type; always `blob`
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Blob id, or `None` to delete
    pub sha: Option<Oid>,
}

impl TreeItem {
    /// Point `path` at `blob`.
    pub fn upsert(path: &ContentPath, blob: Oid) -> Self {
        Self {
            path: path.as_str().to_string(),
            mode: BLOB_MODE,
            kind: "blob",
            sha: Some(blob),
        }
    }

    /// Remove `path`.
    pub fn delete(path: &ContentPath) -> Self {
        Self {
            path: path.as_str().to_string(),
            mode: BLOB_MODE,
            kind: "blob",
            sha: None,
        }
    }

    /// Whether this item removes its path.
    pub fn is_deletion(&self) -> bool {
        self.sha.is_none()
    }
}

/// A commit as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit id
    pub sha: Oid,
    /// Root tree id
    pub tree: Oid,
    /// Parent commit ids
    pub parents: Vec<Oid>,
}

/// File contents read at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// Blob id
    pub sha: Oid,
    /// Raw bytes
    pub content: Vec<u8>,
}

impl FileContent {
    /// Contents as UTF-8.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.content)
    }
}

/// Author identity recorded on commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitAuthor {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

/// Request to create a commit.
#[derive(Debug, Clone)]
pub struct NewCommit {
    /// Commit message
    pub message: String,
    /// Root tree id
    pub tree: Oid,
    /// Parent commit ids
    pub parents: Vec<Oid>,
    /// Author override; the store's default identity otherwise
    pub author: Option<CommitAuthor>,
}

/// State of the most recent site build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Waiting to start
    Queued,
    /// Running
    Building,
    /// Finished and live
    Built,
    /// Finished with an error
    Errored,
}

impl BuildStatus {
    /// Parse a status string as reported by the hosting service.
    ///
    /// Unknown values are treated as still building.
    pub fn parse(value: &str) -> Self {
        match value {
            "queued" => BuildStatus::Queued,
            "built" => BuildStatus::Built,
            "errored" => BuildStatus::Errored,
            _ => BuildStatus::Building,
        }
    }

    /// Whether the build has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::Built | BuildStatus::Errored)
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Queued => write!(f, "queued"),
            BuildStatus::Building => write!(f, "building"),
            BuildStatus::Built => write!(f, "built"),
            BuildStatus::Errored => write!(f, "errored"),
        }
    }
}

/// The most recent site build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    /// Build state
    pub status: BuildStatus,
    /// Commit the build was made from, when reported
    pub commit: Option<String>,
}

impl BuildInfo {
    /// Whether this build is live and, if `commit` is given, built from it.
    pub fn is_live_for(&self, commit: Option<&str>) -> bool {
        self.status == BuildStatus::Built
            && commit.map_or(true, |c| self.commit.as_deref() == Some(c))
    }
}

/// Content-addressed versioned store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, StoreError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed`: Prompt user to authenticate
/// - `NotFound`: Resource doesn't exist
/// - `Conflict`: Re-read and retry at a higher level
/// - `RateLimited`: Back off and retry
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short identifier of the store ("github", "mock").
    fn name(&self) -> &'static str;

    /// The repository's default branch.
    async fn default_branch(&self, repo: &RepoRef) -> Result<BranchName, StoreError>;

    /// Current head commit of `branch`.
    async fn read_ref(&self, repo: &RepoRef, branch: &BranchName) -> Result<Oid, StoreError>;

    /// Read a commit.
    async fn read_commit(&self, repo: &RepoRef, sha: &Oid) -> Result<CommitInfo, StoreError>;

    /// Read a file at a commit. `Ok(None)` when the path does not exist.
    async fn read_file(
        &self,
        repo: &RepoRef,
        path: &ContentPath,
        at: &Oid,
    ) -> Result<Option<FileContent>, StoreError>;

    /// Whether a file exists at a commit.
    async fn path_exists(
        &self,
        repo: &RepoRef,
        path: &ContentPath,
        at: &Oid,
    ) -> Result<bool, StoreError> {
        Ok(self.read_file(repo, path, at).await?.is_some())
    }

    /// Store `content` as a blob and return its id.
    async fn create_blob(&self, repo: &RepoRef, content: &[u8]) -> Result<Oid, StoreError>;

    /// Create a tree by applying `items` on top of `base_tree`.
    async fn create_tree(
        &self,
        repo: &RepoRef,
        base_tree: &Oid,
        items: &[TreeItem],
    ) -> Result<Oid, StoreError>;

    /// Create a commit object. Does not move any branch.
    async fn create_commit(&self, repo: &RepoRef, commit: NewCommit) -> Result<Oid, StoreError>;

    /// Fast-forward `branch` from `expected` to `new`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if `branch` no longer points at
    /// `expected`.
    async fn update_ref(
        &self,
        repo: &RepoRef,
        branch: &BranchName,
        expected: &Oid,
        new: &Oid,
    ) -> Result<(), StoreError>;
}

/// Source of site build status.
#[async_trait]
pub trait BuildStatusSource: Send + Sync {
    /// The most recent build of the published site.
    async fn latest_build(&self, repo: &RepoRef) -> Result<BuildInfo, StoreError>;
}
