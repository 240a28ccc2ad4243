//! engine::ops
//!
//! The public operations on a log index.
//!
//! Each operation validates its input, then hands a planner to the
//! [`Publisher`]. The planner reads the host document at the head the
//! pipeline resolved and returns the change set; the pipeline writes it as
//! one commit. Every operation returns an [`OpOutcome`].
//!
//! | Operation                   | Commit message                     |
//! |-----------------------------|------------------------------------|
//! | `apply_reorder_and_deletes` | `Apply log reorder and deletions`  |
//! | `delete_one`                | `Delete {path}`                    |
//! | `add_one`                   | `Upload {path}`                    |
//! | `initialize`                | `Initialize log index`             |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use logshelf::core::types::{BranchName, RepoRef, RepoScope};
//! use logshelf::engine::{LogShelf, NewLog};
//! use logshelf::forge::mock::MockStore;
//! use logshelf::listing::ListMarkers;
//!
//! # tokio_test::block_on(async {
//! let repo = RepoRef::new("alice", "logs").unwrap();
//! let store = MockStore::new().with_repo(&repo, &BranchName::new("main").unwrap(), &[]);
//! let shelf = LogShelf::new(Arc::new(store), ListMarkers::default()).unwrap();
//! let scope = RepoScope::authorize("alice", "alice", "logs").unwrap();
//!
//! assert!(shelf.initialize(&scope).await.is_ok());
//! let outcome = shelf
//!     .add_one(&scope, NewLog::new("log/x.html", "<html></html>").label("Session 1"))
//!     .await;
//! assert!(outcome.is_ok());
//! # });
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::changes::PendingChangeSet;
use super::error::{OpError, OpOutcome};
use super::pipeline::{BaseSnapshot, ChangePlanner, PublishRequest, Publisher};
use crate::core::config::Config;
use crate::core::types::{BranchName, ContentPath, RepoRef, RepoScope};
use crate::forge::{CommitAuthor, ObjectStore};
use crate::listing::page::{self, COMPANION_ASSETS};
use crate::listing::{CodecError, Entry, ListCodec, ListMarkers};

/// Clock used to timestamp new entries.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A log to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLog {
    /// Content path, also the entry identifier
    pub path: String,
    /// Link text; the file name when empty
    pub label: String,
    /// Muted label shown before the link
    pub scenario: String,
    /// Log contents
    pub content: Vec<u8>,
    /// Inject the robots meta, font style, and robots script
    pub prepare: bool,
}

impl NewLog {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            label: String::new(),
            scenario: String::new(),
            content: content.into(),
            prepare: false,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = scenario.into();
        self
    }

    pub fn prepared(mut self, prepare: bool) -> Self {
        self.prepare = prepare;
        self
    }
}

/// Operations on the log index of a repository.
pub struct LogShelf {
    publisher: Publisher,
    codec: ListCodec,
    index_path: ContentPath,
    branch: Option<BranchName>,
    publish_assets: bool,
    clock: Clock,
}

impl std::fmt::Debug for LogShelf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogShelf")
            .field("publisher", &self.publisher)
            .field("markers", self.codec.markers())
            .field("index_path", &self.index_path)
            .field("branch", &self.branch)
            .field("publish_assets", &self.publish_assets)
            .finish()
    }
}

impl LogShelf {
    /// Create a façade over `store` with default settings.
    pub fn new(store: Arc<dyn ObjectStore>, markers: ListMarkers) -> Result<Self, OpError> {
        Ok(Self {
            publisher: Publisher::new(store),
            codec: ListCodec::new(markers)?,
            index_path: ContentPath::index_html(),
            branch: None,
            publish_assets: true,
            clock: Arc::new(Utc::now),
        })
    }

    /// Create a façade configured from `config`.
    pub fn from_config(store: Arc<dyn ObjectStore>, config: &Config) -> Result<Self, OpError> {
        let author = config.commit_author().map(|a| CommitAuthor {
            name: a.name.clone(),
            email: a.email.clone(),
        });
        Ok(Self::new(store, config.markers())?
            .with_index_path(config.index_path())
            .with_branch(config.branch())
            .with_author(author)
            .with_assets(config.publish_assets()))
    }

    pub fn with_index_path(mut self, index_path: ContentPath) -> Self {
        self.index_path = index_path;
        self
    }

    /// Publish to `branch` instead of the repository default.
    pub fn with_branch(mut self, branch: Option<BranchName>) -> Self {
        self.branch = branch;
        self
    }

    pub fn with_author(mut self, author: Option<CommitAuthor>) -> Self {
        self.publisher = self.publisher.with_author(author);
        self
    }

    /// Whether missing companion assets are written by add and init.
    pub fn with_assets(mut self, publish: bool) -> Self {
        self.publish_assets = publish;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn index_path(&self) -> &ContentPath {
        &self.index_path
    }

    /// Rewrite the list region to `order` and delete the content of
    /// every path in `deletes`.
    ///
    /// Identifiers in `order` without an entry get a stub entry. Paths in
    /// `deletes` that do not exist are only dropped from the list.
    pub async fn apply_reorder_and_deletes(
        &self,
        scope: &RepoScope,
        order: &[String],
        deletes: &[String],
    ) -> OpOutcome {
        let planner = match ApplyPlanner::new(self, order, deletes) {
            Ok(planner) => planner,
            Err(e) => return self.rejected(scope, "apply", e),
        };
        self.run(scope, &planner).await
    }

    /// Delete the content at `path` and its entry, in one commit.
    pub async fn delete_one(&self, scope: &RepoScope, path: &str) -> OpOutcome {
        let planner = match self.content_path(path) {
            Ok(path) => DeletePlanner { shelf: self, path },
            Err(e) => return self.rejected(scope, "delete", e),
        };
        self.run(scope, &planner).await
    }

    /// Upload a log and add its entry, newest first.
    pub async fn add_one(&self, scope: &RepoScope, log: NewLog) -> OpOutcome {
        let planner = match AddPlanner::new(self, scope.repo(), log) {
            Ok(planner) => planner,
            Err(e) => return self.rejected(scope, "add", e),
        };
        self.run(scope, &planner).await
    }

    /// Publish the default host document and companion assets.
    pub async fn initialize(&self, scope: &RepoScope) -> OpOutcome {
        let planner = InitPlanner {
            shelf: self,
            repo: scope.repo(),
        };
        self.run(scope, &planner).await
    }

    async fn run(&self, scope: &RepoScope, planner: &dyn ChangePlanner) -> OpOutcome {
        let request = PublishRequest::new(scope.repo().clone()).on_branch(self.branch.clone());
        let result = self
            .publisher
            .publish(&request, planner)
            .await
            .map(|published| published.commit);
        if let Err(e) = &result {
            tracing::debug!(
                owner = %scope.repo().owner,
                repo = %scope.repo().name,
                operation = planner.name(),
                kind = %e.kind(),
                error = %e,
                "operation failed"
            );
        }
        OpOutcome::from(result)
    }

    fn rejected(&self, scope: &RepoScope, operation: &str, err: OpError) -> OpOutcome {
        tracing::debug!(
            owner = %scope.repo().owner,
            repo = %scope.repo().name,
            operation,
            error = %err,
            "rejected before contacting the store"
        );
        OpOutcome::Failed(err)
    }

    /// Validate a caller-supplied content path.
    fn content_path(&self, raw: &str) -> Result<ContentPath, OpError> {
        let path = ContentPath::new(raw.trim())?;
        if path == self.index_path {
            return Err(OpError::validation(format!(
                "{path} is the host document"
            )));
        }
        Ok(path)
    }

    async fn read_document(&self, base: &BaseSnapshot<'_>) -> Result<String, OpError> {
        base.read_text(&self.index_path).await?.ok_or_else(|| {
            OpError::not_initialized(format!(
                "{} does not exist on {}; run init first",
                self.index_path,
                base.branch()
            ))
        })
    }

    /// Add every companion asset missing at the head.
    async fn add_missing_assets(
        &self,
        base: &BaseSnapshot<'_>,
        changes: &mut PendingChangeSet,
    ) -> Result<(), OpError> {
        if !self.publish_assets {
            return Ok(());
        }
        for asset in COMPANION_ASSETS {
            let Some(path) = asset.path_beside(&self.index_path) else {
                continue;
            };
            if changes.upserts().contains_key(&path) || base.exists(&path).await? {
                continue;
            }
            changes.upsert(path, asset.contents)?;
        }
        Ok(())
    }

    fn is_asset_path(&self, path: &ContentPath) -> bool {
        COMPANION_ASSETS
            .iter()
            .filter_map(|a| a.path_beside(&self.index_path))
            .any(|p| &p == path)
    }
}

struct ApplyPlanner<'a> {
    shelf: &'a LogShelf,
    order: Vec<String>,
    deletes: Vec<ContentPath>,
}

impl<'a> ApplyPlanner<'a> {
    fn new(shelf: &'a LogShelf, order: &[String], deletes: &[String]) -> Result<Self, OpError> {
        let order = order
            .iter()
            .map(|id| shelf.content_path(id).map(String::from))
            .collect::<Result<Vec<_>, _>>()?;
        let deletes = deletes
            .iter()
            .map(|p| shelf.content_path(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            shelf,
            order,
            deletes,
        })
    }
}

#[async_trait]
impl ChangePlanner for ApplyPlanner<'_> {
    fn name(&self) -> &'static str {
        "apply"
    }

    async fn plan(&self, base: &BaseSnapshot<'_>) -> Result<PendingChangeSet, OpError> {
        let document = self.shelf.read_document(base).await?;
        let deletions: HashSet<String> =
            self.deletes.iter().map(|p| p.as_str().to_string()).collect();
        let merged = self.shelf.codec.merge(&document, &self.order, &deletions)?;

        let mut changes = PendingChangeSet::new("Apply log reorder and deletions");
        changes.upsert(self.shelf.index_path.clone(), merged)?;
        for path in &self.deletes {
            if base.exists(path).await? {
                changes.delete(path.clone())?;
            } else {
                tracing::debug!(path = %path, "deletion target absent, list only");
            }
        }
        Ok(changes)
    }
}

struct DeletePlanner<'a> {
    shelf: &'a LogShelf,
    path: ContentPath,
}

#[async_trait]
impl ChangePlanner for DeletePlanner<'_> {
    fn name(&self) -> &'static str {
        "delete"
    }

    async fn plan(&self, base: &BaseSnapshot<'_>) -> Result<PendingChangeSet, OpError> {
        if !base.exists(&self.path).await? {
            return Err(OpError::not_found(format!(
                "{} does not exist on {}",
                self.path,
                base.branch()
            )));
        }
        let document = self.shelf.read_document(base).await?;

        let mut changes = PendingChangeSet::new(format!("Delete {}", self.path));
        changes.delete(self.path.clone())?;
        match self.shelf.codec.remove(&document, self.path.as_str()) {
            Ok(Some(updated)) => {
                changes.upsert(self.shelf.index_path.clone(), updated)?;
            }
            Ok(None) | Err(CodecError::RegionNotFound { .. }) => {
                tracing::debug!(path = %self.path, "no entry to remove");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(changes)
    }
}

struct AddPlanner<'a> {
    shelf: &'a LogShelf,
    repo: &'a RepoRef,
    path: ContentPath,
    log: NewLog,
}

impl<'a> AddPlanner<'a> {
    fn new(shelf: &'a LogShelf, repo: &'a RepoRef, log: NewLog) -> Result<Self, OpError> {
        let path = shelf.content_path(&log.path)?;
        if shelf.publish_assets && shelf.is_asset_path(&path) {
            return Err(OpError::validation(format!(
                "{path} is reserved for a companion asset"
            )));
        }
        if log.content.len() > super::changes::MAX_CONTENT_BYTES {
            return Err(OpError::validation(format!(
                "{path} is {} bytes; the limit is {}",
                log.content.len(),
                super::changes::MAX_CONTENT_BYTES
            )));
        }
        Ok(Self {
            shelf,
            repo,
            path,
            log,
        })
    }

    fn content(&self) -> Result<Vec<u8>, OpError> {
        if !self.log.prepare {
            return Ok(self.log.content.clone());
        }
        let robots = COMPANION_ASSETS
            .iter()
            .find(|a| a.name == "norobot.js")
            .and_then(|a| a.path_beside(&self.shelf.index_path));
        match robots {
            Some(robots) => {
                let href = page::relative_href(&self.path, &robots);
                page::prepare_log(&self.log.content, &href).map_err(OpError::from)
            }
            None => Ok(self.log.content.clone()),
        }
    }
}

#[async_trait]
impl ChangePlanner for AddPlanner<'_> {
    fn name(&self) -> &'static str {
        "add"
    }

    async fn plan(&self, base: &BaseSnapshot<'_>) -> Result<PendingChangeSet, OpError> {
        if base.exists(&self.path).await? {
            return Err(OpError::already_exists(format!(
                "{} already exists on {}",
                self.path,
                base.branch()
            )));
        }
        let document = self.shelf.read_document(base).await?;

        let label = match self.log.label.trim() {
            "" => self.path.file_name().to_string(),
            label => label.to_string(),
        };
        let entry = Entry::for_log(
            &self.path,
            &page::relative_href(&self.shelf.index_path, &self.path),
            &label,
            self.log.scenario.trim(),
            (self.shelf.clock)(),
            self.shelf.codec.markers(),
        );
        let document = self.shelf.codec.insert(&document, &entry);
        let document = page::ensure_loader(&document, self.repo, self.shelf.codec.markers())?;

        let mut changes = PendingChangeSet::new(format!("Upload {}", self.path));
        changes.upsert(self.path.clone(), self.content()?)?;
        changes.upsert(self.shelf.index_path.clone(), document)?;
        self.shelf.add_missing_assets(base, &mut changes).await?;
        Ok(changes)
    }
}

struct InitPlanner<'a> {
    shelf: &'a LogShelf,
    repo: &'a RepoRef,
}

#[async_trait]
impl ChangePlanner for InitPlanner<'_> {
    fn name(&self) -> &'static str {
        "init"
    }

    async fn plan(&self, base: &BaseSnapshot<'_>) -> Result<PendingChangeSet, OpError> {
        let index = &self.shelf.index_path;
        if base.exists(index).await? {
            return Err(OpError::already_exists(format!(
                "{index} already exists on {}",
                base.branch()
            )));
        }

        let markers = self.shelf.codec.markers();
        let document = page::ensure_loader(&page::default_document(markers), self.repo, markers)?;

        let mut changes = PendingChangeSet::new("Initialize log index");
        changes.upsert(index.clone(), document)?;
        self.shelf.add_missing_assets(base, &mut changes).await?;
        Ok(changes)
    }
}
