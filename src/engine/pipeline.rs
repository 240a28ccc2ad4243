//! engine::pipeline
//!
//! The single path by which changes reach the store.
//!
//! # Stages
//!
//! ```text
//! [RESOLVE_BRANCH] -> READ_REF -> READ_BASE_TREE -> PLAN
//!     -> WRITE_CONTENT_BLOBS -> COMPOSE_TREE -> CREATE_COMMIT -> UPDATE_REF -> DONE
//! ```
//!
//! Stages run strictly in sequence. PLAN reads whatever it needs at the
//! head read in READ_REF and returns the [`PendingChangeSet`]; nothing is
//! written before it returns.
//!
//! # Failure semantics
//!
//! - Any failure before UPDATE_REF leaves the branch untouched. Blobs,
//!   trees, or commits already written are unreferenced garbage.
//! - A stale head at UPDATE_REF surfaces as `CONFLICT`. The pipeline never
//!   retries; resubmitting restarts from READ_REF against the new head.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::changes::{compose, PendingChangeSet};
use super::error::OpError;
use crate::core::types::{BranchName, ContentPath, Oid, RepoRef};
use crate::forge::{CommitAuthor, FileContent, NewCommit, ObjectStore};

/// Pipeline stage, used in logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    ResolveBranch,
    ReadRef,
    ReadBaseTree,
    Plan,
    WriteContentBlobs,
    ComposeTree,
    CreateCommit,
    UpdateRef,
    Done,
}

impl PublishStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishStage::ResolveBranch => "resolve_branch",
            PublishStage::ReadRef => "read_ref",
            PublishStage::ReadBaseTree => "read_base_tree",
            PublishStage::Plan => "plan",
            PublishStage::WriteContentBlobs => "write_content_blobs",
            PublishStage::ComposeTree => "compose_tree",
            PublishStage::CreateCommit => "create_commit",
            PublishStage::UpdateRef => "update_ref",
            PublishStage::Done => "done",
        }
    }
}

impl std::fmt::Display for PublishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Target repository
    pub repo: RepoRef,
    /// Branch override; the repository default branch otherwise
    pub branch: Option<BranchName>,
}

impl PublishRequest {
    pub fn new(repo: RepoRef) -> Self {
        Self { repo, branch: None }
    }

    pub fn on_branch(mut self, branch: Option<BranchName>) -> Self {
        self.branch = branch;
        self
    }
}

/// A landed publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Branch that moved
    pub branch: BranchName,
    /// Head before the publish
    pub parent: Oid,
    /// Head after the publish
    pub commit: Oid,
}

/// The state a plan is computed against.
pub struct BaseSnapshot<'a> {
    store: &'a dyn ObjectStore,
    repo: &'a RepoRef,
    branch: BranchName,
    head: Oid,
    tree: Oid,
}

impl<'a> BaseSnapshot<'a> {
    pub fn repo(&self) -> &RepoRef {
        self.repo
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub fn head(&self) -> &Oid {
        &self.head
    }

    pub fn tree(&self) -> &Oid {
        &self.tree
    }

    /// Read `path` at the head.
    pub async fn read(&self, path: &ContentPath) -> Result<Option<FileContent>, OpError> {
        self.store
            .read_file(self.repo, path, &self.head)
            .await
            .map_err(|e| OpError::store(PublishStage::Plan, e))
    }

    /// Read `path` at the head as text.
    ///
    /// Content that is not valid UTF-8 is a parse failure; it is never
    /// re-encoded.
    pub async fn read_text(&self, path: &ContentPath) -> Result<Option<String>, OpError> {
        let Some(file) = self.read(path).await? else {
            return Ok(None);
        };
        String::from_utf8(file.content).map(Some).map_err(|e| {
            OpError::parse_failure(format!(
                "{path} is not valid UTF-8 (invalid byte at offset {})",
                e.utf8_error().valid_up_to()
            ))
        })
    }

    /// Whether `path` exists at the head.
    pub async fn exists(&self, path: &ContentPath) -> Result<bool, OpError> {
        self.store
            .path_exists(self.repo, path, &self.head)
            .await
            .map_err(|e| OpError::store(PublishStage::Plan, e))
    }
}

/// Computes the change set for one publish from the base snapshot.
#[async_trait]
pub trait ChangePlanner: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Compute the changes. Must not write to the store.
    async fn plan(&self, base: &BaseSnapshot<'_>) -> Result<PendingChangeSet, OpError>;
}

/// Runs the publish stages against an [`ObjectStore`].
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    author: Option<CommitAuthor>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("store", &self.store.name())
            .field("author", &self.author)
            .finish()
    }
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            author: None,
        }
    }

    /// Record `author` on every commit.
    pub fn with_author(mut self, author: Option<CommitAuthor>) -> Self {
        self.author = author;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Publish the changes `planner` computes as one commit.
    pub async fn publish(
        &self,
        request: &PublishRequest,
        planner: &dyn ChangePlanner,
    ) -> Result<Published, OpError> {
        let repo = &request.repo;
        let store = self.store.as_ref();

        let branch = match &request.branch {
            Some(branch) => branch.clone(),
            None => {
                trace_stage(repo, None, PublishStage::ResolveBranch);
                store
                    .default_branch(repo)
                    .await
                    .map_err(|e| OpError::store(PublishStage::ResolveBranch, e))?
            }
        };

        trace_stage(repo, Some(&branch), PublishStage::ReadRef);
        let head = store
            .read_ref(repo, &branch)
            .await
            .map_err(|e| OpError::store(PublishStage::ReadRef, e))?;

        trace_stage(repo, Some(&branch), PublishStage::ReadBaseTree);
        let base = store
            .read_commit(repo, &head)
            .await
            .map_err(|e| OpError::store(PublishStage::ReadBaseTree, e))?;

        trace_stage(repo, Some(&branch), PublishStage::Plan);
        let snapshot = BaseSnapshot {
            store,
            repo,
            branch: branch.clone(),
            head: head.clone(),
            tree: base.tree.clone(),
        };
        let changes = planner.plan(&snapshot).await?;
        if changes.is_empty() {
            return Err(OpError::validation("nothing to publish"));
        }
        tracing::debug!(
            planner = planner.name(),
            upserts = changes.upserts().len(),
            deletions = changes.deletions().len(),
            "planned changes"
        );

        trace_stage(repo, Some(&branch), PublishStage::WriteContentBlobs);
        let mut written = BTreeMap::new();
        for (path, content) in changes.upserts() {
            let blob = store
                .create_blob(repo, content)
                .await
                .map_err(|e| OpError::store(PublishStage::WriteContentBlobs, e))?;
            written.insert(path.clone(), blob);
        }

        trace_stage(repo, Some(&branch), PublishStage::ComposeTree);
        let description = compose(&base.tree, &written, changes.deletions());
        let tree = store
            .create_tree(repo, &description.base_tree, &description.items)
            .await
            .map_err(|e| OpError::store(PublishStage::ComposeTree, e))?;

        trace_stage(repo, Some(&branch), PublishStage::CreateCommit);
        let commit = store
            .create_commit(
                repo,
                NewCommit {
                    message: changes.message().to_string(),
                    tree,
                    parents: vec![head.clone()],
                    author: self.author.clone(),
                },
            )
            .await
            .map_err(|e| OpError::store(PublishStage::CreateCommit, e))?;

        trace_stage(repo, Some(&branch), PublishStage::UpdateRef);
        if let Err(e) = store.update_ref(repo, &branch, &head, &commit).await {
            let err = OpError::store(PublishStage::UpdateRef, e);
            if err.kind() == super::ErrorKind::Conflict {
                tracing::warn!(
                    owner = %repo.owner,
                    repo = %repo.name,
                    branch = %branch,
                    parent = %head.short(7),
                    "branch moved during publish"
                );
            }
            return Err(err);
        }

        tracing::info!(
            owner = %repo.owner,
            repo = %repo.name,
            branch = %branch,
            stage = %PublishStage::Done,
            commit = %commit,
            "published"
        );

        Ok(Published {
            branch,
            parent: head,
            commit,
        })
    }
}

fn trace_stage(repo: &RepoRef, branch: Option<&BranchName>, stage: PublishStage) {
    tracing::debug!(
        owner = %repo.owner,
        repo = %repo.name,
        branch = branch.map(BranchName::as_str).unwrap_or("-"),
        stage = %stage,
        "publish stage"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ErrorKind;
    use crate::forge::mock::{FailOn, MockStore, StoreOperation};
    use crate::forge::StoreError;

    struct WriteFile(&'static str, &'static str);

    #[async_trait]
    impl ChangePlanner for WriteFile {
        fn name(&self) -> &'static str {
            "write_file"
        }

        async fn plan(&self, _base: &BaseSnapshot<'_>) -> Result<PendingChangeSet, OpError> {
            let mut changes = PendingChangeSet::new(format!("Write {}", self.0));
            changes.upsert(ContentPath::new(self.0)?, self.1)?;
            Ok(changes)
        }
    }

    struct Nothing;

    #[async_trait]
    impl ChangePlanner for Nothing {
        fn name(&self) -> &'static str {
            "nothing"
        }

        async fn plan(&self, _base: &BaseSnapshot<'_>) -> Result<PendingChangeSet, OpError> {
            Ok(PendingChangeSet::new("empty"))
        }
    }

    fn repo() -> RepoRef {
        RepoRef::new("alice", "logs").unwrap()
    }

    fn branch() -> BranchName {
        BranchName::new("main").unwrap()
    }

    fn store() -> MockStore {
        MockStore::new().with_repo(&repo(), &branch(), &[("keep.txt", "kept")])
    }

    #[tokio::test]
    async fn publishes_in_stage_order() {
        let store = store();
        let publisher = Publisher::new(Arc::new(store.clone()));
        let published = publisher
            .publish(&PublishRequest::new(repo()), &WriteFile("a.txt", "A"))
            .await
            .unwrap();

        assert_eq!(store.head(&repo(), &branch()), Some(published.commit.clone()));
        assert_eq!(store.file_at_head(&repo(), &branch(), "a.txt").as_deref(), Some("A"));
        assert_eq!(
            store.file_at_head(&repo(), &branch(), "keep.txt").as_deref(),
            Some("kept")
        );

        let kinds: Vec<&'static str> = store
            .operations()
            .iter()
            .map(|op| match op {
                StoreOperation::DefaultBranch => "default_branch",
                StoreOperation::ReadRef { .. } => "read_ref",
                StoreOperation::ReadCommit { .. } => "read_commit",
                StoreOperation::ReadFile { .. } => "read_file",
                StoreOperation::CreateBlob { .. } => "create_blob",
                StoreOperation::CreateTree { .. } => "create_tree",
                StoreOperation::CreateCommit { .. } => "create_commit",
                StoreOperation::UpdateRef { .. } => "update_ref",
                StoreOperation::LatestBuild => "latest_build",
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "default_branch",
                "read_ref",
                "read_commit",
                "create_blob",
                "create_tree",
                "create_commit",
                "update_ref"
            ]
        );
    }

    #[tokio::test]
    async fn branch_override_skips_resolution() {
        let store = store();
        let publisher = Publisher::new(Arc::new(store.clone()));
        publisher
            .publish(
                &PublishRequest::new(repo()).on_branch(Some(branch())),
                &WriteFile("a.txt", "A"),
            )
            .await
            .unwrap();
        assert!(!store.operations().contains(&StoreOperation::DefaultBranch));
    }

    #[tokio::test]
    async fn failure_before_update_leaves_branch() {
        let store = store().fail_on(FailOn::CreateCommit(StoreError::ApiError {
            status: 500,
            message: "boom".into(),
        }));
        let before = store.head(&repo(), &branch());
        let publisher = Publisher::new(Arc::new(store.clone()));
        let err = publisher
            .publish(&PublishRequest::new(repo()), &WriteFile("a.txt", "A"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        assert!(err.message().starts_with("create_commit:"));
        assert_eq!(store.head(&repo(), &branch()), before);
    }

    #[tokio::test]
    async fn stale_head_is_conflict() {
        let store = store().fail_on(FailOn::UpdateRef(StoreError::Conflict {
            branch: "main".into(),
        }));
        let publisher = Publisher::new(Arc::new(store));
        let err = publisher
            .publish(&PublishRequest::new(repo()), &WriteFile("a.txt", "A"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn empty_plan_writes_nothing() {
        let store = store();
        let publisher = Publisher::new(Arc::new(store.clone()));
        let err = publisher
            .publish(&PublishRequest::new(repo()), &Nothing)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn author_is_recorded() {
        let store = store();
        let author = CommitAuthor {
            name: "Log Bot".into(),
            email: "bot@example.com".into(),
        };
        let publisher = Publisher::new(Arc::new(store.clone())).with_author(Some(author.clone()));
        let published = publisher
            .publish(&PublishRequest::new(repo()), &WriteFile("a.txt", "A"))
            .await
            .unwrap();
        assert_eq!(store.commit_author(&repo(), &published.commit), Some(author));
    }
}
