//! Fire-and-forget handler for hook-triggered notify jobs: version calc,
//! fetch (with tags), ahead/behind against upstream, then a `SyncCommand`
//! pushed to control over the RPC link. Every sub-step failure is logged
//! and swallowed here; nothing from this path ever reaches a requester
//! because there is no requester.

use crate::state::AgentState;
use crate::vcs::VcsExecutor;
use graymoon_core::{JobEnvelope, NotifyPayload};
use graymoon_wire::SyncCommand;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

pub struct NotifyHandler {
    state: Arc<AgentState>,
    vcs: Arc<dyn VcsExecutor>,
    outbox: UnboundedSender<SyncCommand>,
}

impl NotifyHandler {
    pub fn new(state: Arc<AgentState>, vcs: Arc<dyn VcsExecutor>, outbox: UnboundedSender<SyncCommand>) -> Self {
        Self { state, vcs, outbox }
    }

    pub async fn handle(&self, payload: NotifyPayload) {
        debug!(repository_id = %payload.repository_id, "notify job received");
        if let Err(err) = self.run(&payload).await {
            warn!(repository_id = %payload.repository_id, error = %err, "notify job failed");
        }
    }

    async fn run(&self, payload: &NotifyPayload) -> graymoon_core::Result<()> {
        let path = Path::new(&payload.repository_path);
        self.vcs.fetch(path).await?;
        self.vcs.run_fetch_tags(path).await.ok();

        let branch = match self.state.link(&payload.repository_id).and_then(|l| l.current_branch) {
            Some(branch) => branch,
            None => self.vcs.current_branch(path).await?,
        };

        let version = self.vcs.ahead_behind(path, &branch).await?;
        let has_upstream = self.vcs.has_upstream(path, &branch).await.unwrap_or(false);

        self.state.update_link(&payload.repository_id, |link| {
            link.current_branch = Some(branch.clone());
        });

        let command = SyncCommand {
            workspace_id: payload.workspace_id.clone(),
            repository_id: payload.repository_id.clone(),
            branch: version.branch,
            ahead: version.ahead,
            behind: version.behind,
            has_upstream,
        };

        // Channel closes only when the RPC link has shut down; dropping the
        // notify on the floor is correct at that point, there is nowhere to
        // send it.
        let _ = self.outbox.send(command);
        Ok(())
    }
}

/// Convert a `JobEnvelope::Notify` into its payload, or `None` if called
/// with a `Command` envelope (a worker bug, not a protocol violation).
pub fn notify_payload(envelope: JobEnvelope) -> Option<NotifyPayload> {
    match envelope {
        JobEnvelope::Notify { payload } => Some(payload),
        JobEnvelope::Command { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::GitBranchInfo;
    use async_trait::async_trait;
    use graymoon_core::{GrayMoonError, RepositoryId, WorkspaceId};
    use graymoon_wire::GitVersion;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeVcs {
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VcsExecutor for FakeVcs {
        async fn clone_repo(&self, _: &str, _: &Path, _: Option<&str>) -> graymoon_core::Result<()> {
            unimplemented!()
        }
        async fn fetch(&self, path: &Path) -> graymoon_core::Result<()> {
            self.fetched.lock().push(path.display().to_string());
            Ok(())
        }
        async fn run_fetch_tags(&self, _: &Path) -> graymoon_core::Result<()> {
            Ok(())
        }
        async fn checkout(&self, _: &Path, _: &str) -> graymoon_core::Result<()> {
            unimplemented!()
        }
        async fn create_branch(&self, _: &Path, _: &str, _: Option<&str>) -> graymoon_core::Result<()> {
            unimplemented!()
        }
        async fn current_branch(&self, _: &Path) -> graymoon_core::Result<String> {
            Ok("main".to_string())
        }
        async fn default_branch(&self, _: &Path) -> graymoon_core::Result<String> {
            unimplemented!()
        }
        async fn ahead_behind(&self, _: &Path, branch: &str) -> graymoon_core::Result<GitVersion> {
            Ok(GitVersion { branch: branch.to_string(), head_sha: "abc123".into(), ahead: 1, behind: 0 })
        }
        async fn has_upstream(&self, _: &Path, _: &str) -> graymoon_core::Result<bool> {
            Ok(true)
        }
        async fn push(&self, _: &Path, _: &str, _: bool) -> graymoon_core::Result<()> {
            unimplemented!()
        }
        async fn commit_all(&self, _: &Path, _: &str) -> graymoon_core::Result<String> {
            unimplemented!()
        }
        async fn list_branches(&self, _: &Path) -> graymoon_core::Result<Vec<GitBranchInfo>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn successful_notify_emits_sync_command() {
        let state = Arc::new(AgentState::new());
        let vcs: Arc<dyn VcsExecutor> = Arc::new(FakeVcs::default());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = NotifyHandler::new(state, vcs, tx);

        let payload = NotifyPayload {
            repository_id: RepositoryId::new(),
            workspace_id: WorkspaceId::new(),
            repository_path: "/tmp/does-not-matter".to_string(),
        };
        handler.handle(payload.clone()).await;

        let command = rx.recv().await.expect("sync command sent");
        assert_eq!(command.repository_id, payload.repository_id);
        assert_eq!(command.workspace_id, payload.workspace_id);
        assert_eq!(command.ahead, 1);
        assert!(command.has_upstream);
    }

    #[tokio::test]
    async fn vcs_failure_is_swallowed_not_propagated() {
        struct FailingVcs;
        #[async_trait]
        impl VcsExecutor for FailingVcs {
            async fn clone_repo(&self, _: &str, _: &Path, _: Option<&str>) -> graymoon_core::Result<()> {
                unimplemented!()
            }
            async fn fetch(&self, _: &Path) -> graymoon_core::Result<()> {
                Err(GrayMoonError::VcsFailure("boom".into()))
            }
            async fn run_fetch_tags(&self, _: &Path) -> graymoon_core::Result<()> {
                Ok(())
            }
            async fn checkout(&self, _: &Path, _: &str) -> graymoon_core::Result<()> {
                unimplemented!()
            }
            async fn create_branch(&self, _: &Path, _: &str, _: Option<&str>) -> graymoon_core::Result<()> {
                unimplemented!()
            }
            async fn current_branch(&self, _: &Path) -> graymoon_core::Result<String> {
                unimplemented!()
            }
            async fn default_branch(&self, _: &Path) -> graymoon_core::Result<String> {
                unimplemented!()
            }
            async fn ahead_behind(&self, _: &Path, _: &str) -> graymoon_core::Result<GitVersion> {
                unimplemented!()
            }
            async fn has_upstream(&self, _: &Path, _: &str) -> graymoon_core::Result<bool> {
                unimplemented!()
            }
            async fn push(&self, _: &Path, _: &str, _: bool) -> graymoon_core::Result<()> {
                unimplemented!()
            }
            async fn commit_all(&self, _: &Path, _: &str) -> graymoon_core::Result<String> {
                unimplemented!()
            }
            async fn list_branches(&self, _: &Path) -> graymoon_core::Result<Vec<GitBranchInfo>> {
                unimplemented!()
            }
        }

        let state = Arc::new(AgentState::new());
        let vcs: Arc<dyn VcsExecutor> = Arc::new(FailingVcs);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = NotifyHandler::new(state, vcs, tx);

        handler
            .handle(NotifyPayload {
                repository_id: RepositoryId::new(),
                workspace_id: WorkspaceId::new(),
                repository_path: "/tmp/does-not-matter".to_string(),
            })
            .await;

        assert!(rx.try_recv().is_err());
    }
}
