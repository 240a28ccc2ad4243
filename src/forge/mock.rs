//! forge::mock
//!
//! In-memory object store for deterministic testing.
//!
//! # Design
//!
//! Objects are content addressed with SHA-256, so ids are 64 hex
//! characters. Trees are flat maps from path to blob id. Branch updates
//! are compare-and-swap on the expected head, matching the fast-forward
//! semantics of the real store.
//!
//! Failure scenarios are configured with [`FailOn`]; every call is
//! recorded as a [`StoreOperation`] for later verification. An optional
//! barrier in front of `update_ref` lets tests line up concurrent
//! publishes deterministically.
//!
//! # Example
//!
//! ```
//! use logshelf::core::types::{BranchName, RepoRef};
//! use logshelf::forge::mock::{FailOn, MockStore};
//! use logshelf::forge::{ObjectStore, StoreError};
//!
//! # tokio_test::block_on(async {
//! let repo = RepoRef::new("alice", "logs").unwrap();
//! let main = BranchName::new("main").unwrap();
//! let store = MockStore::new()
//!     .with_repo(&repo, &main, &[("index.html", "<html></html>")])
//!     .fail_on(FailOn::CreateBlob(StoreError::RateLimited));
//!
//! assert!(store.create_blob(&repo, b"x").await.is_err());
//! assert_eq!(store.write_count(), 1);
//! # });
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Barrier;

use super::traits::{
    BuildInfo, BuildStatus, BuildStatusSource, CommitAuthor, CommitInfo, FileContent, NewCommit,
    ObjectStore, StoreError, TreeItem,
};
use crate::core::types::{BranchName, ContentPath, Oid, RepoRef};

/// In-memory object store.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
    update_gate: Option<Arc<Barrier>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    repos: HashMap<RepoRef, RepoState>,
    fail_on: Option<FailOn>,
    operations: Vec<StoreOperation>,
    commit_seq: u64,
}

#[derive(Debug)]
struct RepoState {
    default_branch: BranchName,
    refs: HashMap<BranchName, Oid>,
    blobs: HashMap<Oid, Vec<u8>>,
    trees: HashMap<Oid, BTreeMap<String, Oid>>,
    commits: HashMap<Oid, StoredCommit>,
    builds: VecDeque<BuildInfo>,
}

#[derive(Debug, Clone)]
struct StoredCommit {
    info: CommitInfo,
    message: String,
    author: Option<CommitAuthor>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail default_branch with the given error.
    DefaultBranch(StoreError),
    /// Fail read_ref with the given error.
    ReadRef(StoreError),
    /// Fail read_commit with the given error.
    ReadCommit(StoreError),
    /// Fail read_file with the given error.
    ReadFile(StoreError),
    /// Fail create_blob with the given error.
    CreateBlob(StoreError),
    /// Fail create_tree with the given error.
    CreateTree(StoreError),
    /// Fail create_commit with the given error.
    CreateCommit(StoreError),
    /// Fail update_ref with the given error.
    UpdateRef(StoreError),
    /// Fail latest_build with the given error.
    LatestBuild(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    DefaultBranch,
    ReadRef {
        branch: String,
    },
    ReadCommit {
        sha: Oid,
    },
    ReadFile {
        path: String,
    },
    CreateBlob {
        size: usize,
    },
    CreateTree {
        base_tree: Oid,
        items: Vec<TreeItem>,
    },
    CreateCommit {
        message: String,
        parents: Vec<Oid>,
    },
    UpdateRef {
        branch: String,
        expected: Oid,
        new: Oid,
    },
    LatestBuild,
}

impl StoreOperation {
    /// Whether this operation writes to the store.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreOperation::CreateBlob { .. }
                | StoreOperation::CreateTree { .. }
                | StoreOperation::CreateCommit { .. }
                | StoreOperation::UpdateRef { .. }
        )
    }
}

impl MockStore {
    /// Create an empty store with no repositories.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockStoreInner::default())),
            update_gate: None,
        }
    }

    /// Add a repository whose `branch` holds `files` in a single commit.
    ///
    /// `branch` becomes the default branch. The latest build reports the
    /// initial commit as built.
    pub fn with_repo(self, repo: &RepoRef, branch: &BranchName, files: &[(&str, &str)]) -> Self {
        {
            let mut inner = self.state();
            inner.commit_seq += 1;
            let seq = inner.commit_seq;

            let mut state = RepoState {
                default_branch: branch.clone(),
                refs: HashMap::new(),
                blobs: HashMap::new(),
                trees: HashMap::new(),
                commits: HashMap::new(),
                builds: VecDeque::new(),
            };

            let mut tree = BTreeMap::new();
            for (path, contents) in files {
                let blob = state.put_blob(contents.as_bytes());
                tree.insert((*path).to_string(), blob);
            }
            let tree_id = state.put_tree(tree);
            let head = state.put_commit(tree_id, Vec::new(), "Initial commit".into(), None, seq);
            state.refs.insert(branch.clone(), head.clone());
            state.builds.push_back(BuildInfo {
                status: BuildStatus::Built,
                commit: Some(head.to_string()),
            });

            inner.repos.insert(repo.clone(), state);
        }
        self
    }

    /// Configure the store to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.state().fail_on = None;
    }

    /// Hold every `update_ref` call until `parties` of them are waiting.
    pub fn with_update_barrier(mut self, parties: usize) -> Self {
        self.update_gate = Some(Arc::new(Barrier::new(parties)));
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.state().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// Number of recorded write operations.
    pub fn write_count(&self) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| op.is_write())
            .count()
    }

    /// Current head of `branch`.
    pub fn head(&self, repo: &RepoRef, branch: &BranchName) -> Option<Oid> {
        self.state().repos.get(repo)?.refs.get(branch).cloned()
    }

    /// Text of `path` at the head of `branch`.
    pub fn file_at_head(&self, repo: &RepoRef, branch: &BranchName, path: &str) -> Option<String> {
        self.files_at_head(repo, branch).remove(path)
    }

    /// Raw bytes of `path` at the head of `branch`.
    pub fn bytes_at_head(&self, repo: &RepoRef, branch: &BranchName, path: &str) -> Option<Vec<u8>> {
        let inner = self.state();
        let state = inner.repos.get(repo)?;
        let blob = state.head_tree(branch)?.get(path)?;
        state.blobs.get(blob).cloned()
    }

    /// Every file at the head of `branch`, as text.
    pub fn files_at_head(&self, repo: &RepoRef, branch: &BranchName) -> BTreeMap<String, String> {
        let inner = self.state();
        let Some(state) = inner.repos.get(repo) else {
            return BTreeMap::new();
        };
        let Some(tree) = state.head_tree(branch) else {
            return BTreeMap::new();
        };
        tree.iter()
            .filter_map(|(path, blob)| {
                let bytes = state.blobs.get(blob)?;
                Some((path.clone(), String::from_utf8_lossy(bytes).into_owned()))
            })
            .collect()
    }

    /// Message of a commit.
    pub fn commit_message(&self, repo: &RepoRef, sha: &Oid) -> Option<String> {
        let inner = self.state();
        let commit = inner.repos.get(repo)?.commits.get(sha)?;
        Some(commit.message.clone())
    }

    /// Author recorded on a commit.
    pub fn commit_author(&self, repo: &RepoRef, sha: &Oid) -> Option<CommitAuthor> {
        let inner = self.state();
        inner.repos.get(repo)?.commits.get(sha)?.author.clone()
    }

    /// Commit directly to `branch`, outside the recorded operations.
    ///
    /// Simulates another writer moving the branch.
    pub fn push_commit(
        &self,
        repo: &RepoRef,
        branch: &BranchName,
        message: &str,
        upserts: &[(&str, &str)],
        deletions: &[&str],
    ) -> Option<Oid> {
        let upserts: Vec<(&str, &[u8])> = upserts
            .iter()
            .map(|(path, contents)| (*path, contents.as_bytes()))
            .collect();
        self.push_raw(repo, branch, message, &upserts, deletions)
    }

    /// Like [`push_commit`](Self::push_commit), with arbitrary bytes.
    pub fn push_raw(
        &self,
        repo: &RepoRef,
        branch: &BranchName,
        message: &str,
        upserts: &[(&str, &[u8])],
        deletions: &[&str],
    ) -> Option<Oid> {
        let mut inner = self.state();
        inner.commit_seq += 1;
        let seq = inner.commit_seq;
        let state = inner.repos.get_mut(repo)?;

        let parent = state.refs.get(branch)?.clone();
        let mut tree = state.head_tree(branch)?.clone();
        for (path, contents) in upserts {
            let blob = state.put_blob(contents);
            tree.insert((*path).to_string(), blob);
        }
        for path in deletions {
            tree.remove(*path);
        }
        let tree_id = state.put_tree(tree);
        let head = state.put_commit(tree_id, vec![parent], message.into(), None, seq);
        state.refs.insert(branch.clone(), head.clone());
        Some(head)
    }

    /// Queue build reports. Each `latest_build` call consumes one; the
    /// last one is repeated.
    pub fn set_builds(&self, repo: &RepoRef, builds: Vec<BuildInfo>) {
        if let Some(state) = self.state().repos.get_mut(repo) {
            state.builds = builds.into();
        }
    }

    fn state(&self) -> MutexGuard<'_, MockStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `op`, then fail if configured to.
    fn begin(&self, op: StoreOperation) -> Result<MutexGuard<'_, MockStoreInner>, StoreError> {
        let mut inner = self.state();
        let failure = inner.fail_on.as_ref().and_then(|f| f.error_for(&op)).cloned();
        inner.operations.push(op);
        match failure {
            Some(err) => Err(err),
            None => Ok(inner),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FailOn {
    fn error_for(&self, op: &StoreOperation) -> Option<&StoreError> {
        match (self, op) {
            (FailOn::DefaultBranch(e), StoreOperation::DefaultBranch)
            | (FailOn::ReadRef(e), StoreOperation::ReadRef { .. })
            | (FailOn::ReadCommit(e), StoreOperation::ReadCommit { .. })
            | (FailOn::ReadFile(e), StoreOperation::ReadFile { .. })
            | (FailOn::CreateBlob(e), StoreOperation::CreateBlob { .. })
            | (FailOn::CreateTree(e), StoreOperation::CreateTree { .. })
            | (FailOn::CreateCommit(e), StoreOperation::CreateCommit { .. })
            | (FailOn::UpdateRef(e), StoreOperation::UpdateRef { .. })
            | (FailOn::LatestBuild(e), StoreOperation::LatestBuild) => Some(e),
            _ => None,
        }
    }
}

impl MockStoreInner {
    fn repo(&self, repo: &RepoRef) -> Result<&RepoState, StoreError> {
        self.repos
            .get(repo)
            .ok_or_else(|| StoreError::NotFound(format!("repository {repo}")))
    }

    fn repo_mut(&mut self, repo: &RepoRef) -> Result<&mut RepoState, StoreError> {
        self.repos
            .get_mut(repo)
            .ok_or_else(|| StoreError::NotFound(format!("repository {repo}")))
    }
}

impl RepoState {
    fn head_tree(&self, branch: &BranchName) -> Option<&BTreeMap<String, Oid>> {
        let head = self.refs.get(branch)?;
        self.trees.get(&self.commits.get(head)?.info.tree)
    }

    fn put_blob(&mut self, content: &[u8]) -> Oid {
        let id = object_id("blob", &[content]);
        self.blobs.entry(id.clone()).or_insert_with(|| content.to_vec());
        id
    }

    fn put_tree(&mut self, tree: BTreeMap<String, Oid>) -> Oid {
        let listing: String = tree
            .iter()
            .map(|(path, blob)| format!("{path}\0{blob}\n"))
            .collect();
        let id = object_id("tree", &[listing.as_bytes()]);
        self.trees.entry(id.clone()).or_insert(tree);
        id
    }

    fn put_commit(
        &mut self,
        tree: Oid,
        parents: Vec<Oid>,
        message: String,
        author: Option<CommitAuthor>,
        seq: u64,
    ) -> Oid {
        let parent_list: String = parents.iter().map(|p| format!("{p}\n")).collect();
        let id = object_id(
            "commit",
            &[
                tree.as_str().as_bytes(),
                parent_list.as_bytes(),
                message.as_bytes(),
                &seq.to_be_bytes(),
            ],
        );
        self.commits.insert(
            id.clone(),
            StoredCommit {
                info: CommitInfo {
                    sha: id.clone(),
                    tree,
                    parents,
                },
                message,
                author,
            },
        );
        id
    }

    fn commit(&self, sha: &Oid) -> Result<&StoredCommit, StoreError> {
        self.commits
            .get(sha)
            .ok_or_else(|| StoreError::NotFound(format!("commit {sha}")))
    }

    fn tree(&self, sha: &Oid) -> Result<&BTreeMap<String, Oid>, StoreError> {
        self.trees
            .get(sha)
            .ok_or_else(|| StoreError::NotFound(format!("tree {sha}")))
    }
}

fn object_id(kind: &str, parts: &[&[u8]]) -> Oid {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    for part in parts {
        hasher.update(part);
        hasher.update([0u8]);
    }
    Oid::from_digest(&hasher.finalize())
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn default_branch(&self, repo: &RepoRef) -> Result<BranchName, StoreError> {
        let inner = self.begin(StoreOperation::DefaultBranch)?;
        Ok(inner.repo(repo)?.default_branch.clone())
    }

    async fn read_ref(&self, repo: &RepoRef, branch: &BranchName) -> Result<Oid, StoreError> {
        let inner = self.begin(StoreOperation::ReadRef {
            branch: branch.to_string(),
        })?;
        inner
            .repo(repo)?
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("branch {branch}")))
    }

    async fn read_commit(&self, repo: &RepoRef, sha: &Oid) -> Result<CommitInfo, StoreError> {
        let inner = self.begin(StoreOperation::ReadCommit { sha: sha.clone() })?;
        Ok(inner.repo(repo)?.commit(sha)?.info.clone())
    }

    async fn read_file(
        &self,
        repo: &RepoRef,
        path: &ContentPath,
        at: &Oid,
    ) -> Result<Option<FileContent>, StoreError> {
        let inner = self.begin(StoreOperation::ReadFile {
            path: path.to_string(),
        })?;
        let state = inner.repo(repo)?;
        let tree = state.tree(&state.commit(at)?.info.tree)?;
        Ok(tree.get(path.as_str()).and_then(|blob| {
            state.blobs.get(blob).map(|content| FileContent {
                sha: blob.clone(),
                content: content.clone(),
            })
        }))
    }

    async fn create_blob(&self, repo: &RepoRef, content: &[u8]) -> Result<Oid, StoreError> {
        let mut inner = self.begin(StoreOperation::CreateBlob {
            size: content.len(),
        })?;
        Ok(inner.repo_mut(repo)?.put_blob(content))
    }

    async fn create_tree(
        &self,
        repo: &RepoRef,
        base_tree: &Oid,
        items: &[TreeItem],
    ) -> Result<Oid, StoreError> {
        let mut inner = self.begin(StoreOperation::CreateTree {
            base_tree: base_tree.clone(),
            items: items.to_vec(),
        })?;
        let state = inner.repo_mut(repo)?;
        let mut tree = state.tree(base_tree)?.clone();

        for item in items {
            match &item.sha {
                Some(blob) => {
                    if !state.blobs.contains_key(blob) {
                        return Err(StoreError::ApiError {
                            status: 422,
                            message: format!("blob {blob} does not exist"),
                        });
                    }
                    tree.insert(item.path.clone(), blob.clone());
                }
                None => {
                    tree.remove(&item.path);
                }
            }
        }

        Ok(state.put_tree(tree))
    }

    async fn create_commit(&self, repo: &RepoRef, commit: NewCommit) -> Result<Oid, StoreError> {
        let mut inner = self.begin(StoreOperation::CreateCommit {
            message: commit.message.clone(),
            parents: commit.parents.clone(),
        })?;
        inner.commit_seq += 1;
        let seq = inner.commit_seq;
        let state = inner.repo_mut(repo)?;

        state.tree(&commit.tree)?;
        for parent in &commit.parents {
            state.commit(parent)?;
        }

        Ok(state.put_commit(commit.tree, commit.parents, commit.message, commit.author, seq))
    }

    async fn update_ref(
        &self,
        repo: &RepoRef,
        branch: &BranchName,
        expected: &Oid,
        new: &Oid,
    ) -> Result<(), StoreError> {
        if let Some(gate) = &self.update_gate {
            gate.wait().await;
        }

        let mut inner = self.begin(StoreOperation::UpdateRef {
            branch: branch.to_string(),
            expected: expected.clone(),
            new: new.clone(),
        })?;
        let state = inner.repo_mut(repo)?;
        state.commit(new)?;

        let current = state
            .refs
            .get(branch)
            .ok_or_else(|| StoreError::NotFound(format!("branch {branch}")))?;
        if current != expected {
            return Err(StoreError::Conflict {
                branch: branch.to_string(),
            });
        }

        state.refs.insert(branch.clone(), new.clone());
        Ok(())
    }
}

#[async_trait]
impl BuildStatusSource for MockStore {
    async fn latest_build(&self, repo: &RepoRef) -> Result<BuildInfo, StoreError> {
        let mut inner = self.begin(StoreOperation::LatestBuild)?;
        let state = inner.repo_mut(repo)?;
        let build = if state.builds.len() > 1 {
            state.builds.pop_front()
        } else {
            state.builds.front().cloned()
        };
        build.ok_or_else(|| StoreError::NotFound("no builds".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoRef {
        RepoRef::new("alice", "logs").unwrap()
    }

    fn branch() -> BranchName {
        BranchName::new("main").unwrap()
    }

    fn seeded() -> MockStore {
        MockStore::new().with_repo(&repo(), &branch(), &[("index.html", "<html></html>")])
    }

    #[tokio::test]
    async fn reads_seeded_files() {
        let store = seeded();
        let head = store.read_ref(&repo(), &branch()).await.unwrap();
        let path = ContentPath::new("index.html").unwrap();
        let file = store.read_file(&repo(), &path, &head).await.unwrap().unwrap();
        assert_eq!(file.text().unwrap(), "<html></html>");

        let missing = ContentPath::new("nope.html").unwrap();
        assert!(!store.path_exists(&repo(), &missing, &head).await.unwrap());
    }

    #[tokio::test]
    async fn default_branch_is_seeded_branch() {
        assert_eq!(seeded().default_branch(&repo()).await.unwrap(), branch());
    }

    #[tokio::test]
    async fn unknown_repo_is_not_found() {
        let other = RepoRef::new("bob", "x").unwrap();
        assert!(matches!(
            seeded().read_ref(&other, &branch()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn full_write_cycle() {
        let store = seeded();
        let head = store.read_ref(&repo(), &branch()).await.unwrap();
        let base = store.read_commit(&repo(), &head).await.unwrap();

        let blob = store.create_blob(&repo(), b"log").await.unwrap();
        let path = ContentPath::new("log/a.html").unwrap();
        let tree = store
            .create_tree(&repo(), &base.tree, &[TreeItem::upsert(&path, blob)])
            .await
            .unwrap();
        let commit = store
            .create_commit(
                &repo(),
                NewCommit {
                    message: "Upload log/a.html".into(),
                    tree,
                    parents: vec![head.clone()],
                    author: None,
                },
            )
            .await
            .unwrap();
        store
            .update_ref(&repo(), &branch(), &head, &commit)
            .await
            .unwrap();

        assert_eq!(store.head(&repo(), &branch()), Some(commit.clone()));
        assert_eq!(
            store.file_at_head(&repo(), &branch(), "log/a.html").as_deref(),
            Some("log")
        );
        assert_eq!(
            store.commit_message(&repo(), &commit).as_deref(),
            Some("Upload log/a.html")
        );
        assert_eq!(store.write_count(), 4);
    }

    #[tokio::test]
    async fn deletion_items_remove_paths() {
        let store = seeded();
        let head = store.head(&repo(), &branch()).unwrap();
        let base = store.read_commit(&repo(), &head).await.unwrap();
        let path = ContentPath::new("index.html").unwrap();
        let tree = store
            .create_tree(&repo(), &base.tree, &[TreeItem::delete(&path)])
            .await
            .unwrap();
        assert_ne!(tree, base.tree);
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = seeded();
        let head = store.head(&repo(), &branch()).unwrap();
        let moved = store
            .push_commit(&repo(), &branch(), "other writer", &[("x", "y")], &[])
            .unwrap();

        let result = store.update_ref(&repo(), &branch(), &head, &moved).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert_eq!(store.head(&repo(), &branch()), Some(moved));
    }

    #[tokio::test]
    async fn fail_on_is_recorded() {
        let store = seeded().fail_on(FailOn::ReadRef(StoreError::RateLimited));
        assert!(matches!(
            store.read_ref(&repo(), &branch()).await,
            Err(StoreError::RateLimited)
        ));
        assert_eq!(
            store.operations(),
            vec![StoreOperation::ReadRef {
                branch: "main".into()
            }]
        );

        store.clear_fail_on();
        assert!(store.read_ref(&repo(), &branch()).await.is_ok());
    }

    #[tokio::test]
    async fn builds_are_consumed_in_order() {
        let store = seeded();
        store.set_builds(
            &repo(),
            vec![
                BuildInfo {
                    status: BuildStatus::Building,
                    commit: None,
                },
                BuildInfo {
                    status: BuildStatus::Built,
                    commit: Some("abc".into()),
                },
            ],
        );
        assert_eq!(
            store.latest_build(&repo()).await.unwrap().status,
            BuildStatus::Building
        );
        assert_eq!(
            store.latest_build(&repo()).await.unwrap().status,
            BuildStatus::Built
        );
        assert_eq!(
            store.latest_build(&repo()).await.unwrap().status,
            BuildStatus::Built
        );
    }

    #[test]
    fn object_ids_are_content_addressed() {
        assert_eq!(object_id("blob", &[b"a"]), object_id("blob", &[b"a"]));
        assert_ne!(object_id("blob", &[b"a"]), object_id("blob", &[b"b"]));
        assert_eq!(object_id("blob", &[b"a"]).as_str().len(), 64);
    }
}
