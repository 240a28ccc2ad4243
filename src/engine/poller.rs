//! engine::poller
//!
//! Waits for a published commit to go live.
//!
//! The poller queries the latest site build at a fixed interval until the
//! build is live (for the target commit, when one is given), the build
//! errors, or the caller cancels. There is no implicit timeout;
//! [`BuildPoller::with_max_attempts`] sets an explicit ceiling.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use logshelf::engine::poller::{BuildPoller, PollOutcome};
//! # use logshelf::forge::BuildStatusSource;
//! # use logshelf::core::types::RepoRef;
//!
//! # async fn example(source: Arc<dyn BuildStatusSource>, repo: RepoRef) {
//! let handle = BuildPoller::new(source, Duration::from_secs(5)).spawn(repo, None);
//! // ... later, if the caller loses interest:
//! handle.cancel();
//! assert!(matches!(handle.join().await, PollOutcome::Cancelled | PollOutcome::Live(_)));
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::types::RepoRef;
use crate::forge::{BuildInfo, BuildStatus, BuildStatusSource, StoreError};

/// How polling ended.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The build is live.
    Live(BuildInfo),
    /// The build for the target finished with an error.
    Errored(BuildInfo),
    /// The caller cancelled.
    Cancelled,
    /// The attempt ceiling was reached.
    GaveUp {
        attempts: u32,
        last: Option<BuildInfo>,
    },
    /// The status source failed permanently.
    Failed(StoreError),
}

impl PollOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, PollOutcome::Live(_))
    }
}

/// Polls a [`BuildStatusSource`] at a fixed interval.
#[derive(Clone)]
pub struct BuildPoller {
    source: Arc<dyn BuildStatusSource>,
    interval: Duration,
    max_attempts: Option<u32>,
}

impl std::fmt::Debug for BuildPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPoller")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl BuildPoller {
    pub fn new(source: Arc<dyn BuildStatusSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            max_attempts: None,
        }
    }

    /// Stop after `attempts` queries without a terminal result.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Poll until a terminal outcome or until `shutdown` fires.
    pub async fn wait(
        &self,
        repo: &RepoRef,
        commit: Option<&str>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> PollOutcome {
        let mut attempts = 0u32;
        let mut last = None;

        loop {
            let query = tokio::select! {
                result = self.source.latest_build(repo) => result,
                _ = shutdown.recv() => return PollOutcome::Cancelled,
            };
            attempts += 1;

            match query {
                Ok(build) => {
                    tracing::debug!(
                        owner = %repo.owner,
                        repo = %repo.name,
                        status = %build.status,
                        built = build.commit.as_deref().unwrap_or("-"),
                        attempt = attempts,
                        "build status"
                    );
                    if build.is_live_for(commit) {
                        return PollOutcome::Live(build);
                    }
                    if build.status == BuildStatus::Errored
                        && commit.map_or(true, |c| build.commit.as_deref() == Some(c))
                    {
                        return PollOutcome::Errored(build);
                    }
                    last = Some(build);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(error = %e, attempt = attempts, "build status query failed");
                }
                Err(e) => return PollOutcome::Failed(e),
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return PollOutcome::GaveUp { attempts, last };
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => return PollOutcome::Cancelled,
            }
        }
    }

    /// Poll on a background task.
    pub fn spawn(self, repo: RepoRef, commit: Option<String>) -> PollHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(async move {
            self.wait(&repo, commit.as_deref(), shutdown_rx).await
        });
        PollHandle { shutdown_tx, task }
    }
}

/// A running background poll.
#[derive(Debug)]
pub struct PollHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Ask the poll to stop. Idempotent.
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for the poll to finish.
    ///
    /// A panic in the poll task is resumed on the caller.
    pub async fn join(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // The runtime dropped the task while shutting down
            Err(_) => PollOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BranchName;
    use crate::forge::mock::{FailOn, MockStore};

    fn repo() -> RepoRef {
        RepoRef::new("alice", "logs").unwrap()
    }

    fn store() -> MockStore {
        MockStore::new().with_repo(&repo(), &BranchName::new("main").unwrap(), &[])
    }

    fn build(status: BuildStatus, commit: &str) -> BuildInfo {
        BuildInfo {
            status,
            commit: Some(commit.to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_target_commit() {
        let store = store();
        store.set_builds(
            &repo(),
            vec![
                build(BuildStatus::Built, "old"),
                build(BuildStatus::Building, "new"),
                build(BuildStatus::Built, "new"),
            ],
        );
        let poller = BuildPoller::new(Arc::new(store), Duration::from_secs(5));
        let (_tx, rx) = broadcast::channel(1);

        let outcome = poller.wait(&repo(), Some("new"), rx).await;
        match outcome {
            PollOutcome::Live(info) => assert_eq!(info.commit.as_deref(), Some("new")),
            other => panic!("expected live, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn any_built_is_live_without_target() {
        let poller = BuildPoller::new(Arc::new(store()), Duration::from_secs(5));
        let (_tx, rx) = broadcast::channel(1);
        assert!(poller.wait(&repo(), None, rx).await.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn errored_target_is_terminal() {
        let store = store();
        store.set_builds(&repo(), vec![build(BuildStatus::Errored, "new")]);
        let poller = BuildPoller::new(Arc::new(store), Duration::from_secs(5));
        let (_tx, rx) = broadcast::channel(1);
        assert!(matches!(
            poller.wait(&repo(), Some("new"), rx).await,
            PollOutcome::Errored(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_ceiling() {
        let store = store();
        store.set_builds(&repo(), vec![build(BuildStatus::Building, "new")]);
        let poller =
            BuildPoller::new(Arc::new(store.clone()), Duration::from_secs(5)).with_max_attempts(3);
        let (_tx, rx) = broadcast::channel(1);

        match poller.wait(&repo(), Some("new"), rx).await {
            PollOutcome::GaveUp { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.map(|b| b.status), Some(BuildStatus::Building));
            }
            other => panic!("expected give up, got {other:?}"),
        }
        assert_eq!(store.operations().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_keep_polling() {
        let store = store().fail_on(FailOn::LatestBuild(StoreError::RateLimited));
        let poller =
            BuildPoller::new(Arc::new(store.clone()), Duration::from_secs(5)).with_max_attempts(2);
        let (_tx, rx) = broadcast::channel(1);
        assert!(matches!(
            poller.wait(&repo(), None, rx).await,
            PollOutcome::GaveUp { attempts: 2, last: None }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_stop() {
        let store = store().fail_on(FailOn::LatestBuild(StoreError::NotFound(
            "pages not enabled".into(),
        )));
        let poller = BuildPoller::new(Arc::new(store), Duration::from_secs(5));
        let (_tx, rx) = broadcast::channel(1);
        assert!(matches!(
            poller.wait(&repo(), None, rx).await,
            PollOutcome::Failed(StoreError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_background_poll() {
        let store = store();
        store.set_builds(&repo(), vec![build(BuildStatus::Building, "new")]);
        let handle = BuildPoller::new(Arc::new(store), Duration::from_secs(5))
            .spawn(repo(), Some("new".into()));

        tokio::time::sleep(Duration::from_secs(12)).await;
        handle.cancel();
        assert!(matches!(handle.join().await, PollOutcome::Cancelled));
    }

    struct PanickingSource;

    #[async_trait::async_trait]
    impl BuildStatusSource for PanickingSource {
        async fn latest_build(&self, _repo: &RepoRef) -> Result<BuildInfo, StoreError> {
            panic!("status source blew up");
        }
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "status source blew up")]
    async fn panics_in_background_poll_reach_the_caller() {
        let handle = BuildPoller::new(Arc::new(PanickingSource), Duration::from_secs(5))
            .spawn(repo(), None);
        let _ = handle.join().await;
    }
}
