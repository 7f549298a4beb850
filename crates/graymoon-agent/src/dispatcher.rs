//! Routes an incoming `RequestCommand` to its handler and turns the result
//! into a `ResponseCommand`, never letting a `GrayMoonError` unwind past
//! this boundary.

use crate::state::AgentState;
use crate::vcs::VcsExecutor;
use graymoon_core::{LinkSyncStatus, Result, WorkspaceRepositoryLink};
use graymoon_wire::{RequestCommand, ResponseCommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Dispatcher {
    state: Arc<AgentState>,
    vcs: Arc<dyn VcsExecutor>,
}

impl Dispatcher {
    pub fn new(state: Arc<AgentState>, vcs: Arc<dyn VcsExecutor>) -> Self {
        Self { state, vcs }
    }

    pub async fn dispatch(&self, command: RequestCommand) -> ResponseCommand {
        info!(command = command.name(), "dispatching command");
        let result = self.handle(command).await;
        match result {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "command failed");
                ResponseCommand::error(err)
            }
        }
    }

    async fn handle(&self, command: RequestCommand) -> Result<ResponseCommand> {
        match command {
            RequestCommand::EnsureWorkspace { workspace_id, root_path } => {
                std::fs::create_dir_all(&root_path)
                    .map_err(|e| graymoon_core::GrayMoonError::InternalError(e.to_string()))?;
                self.state.ensure_workspace(workspace_id, PathBuf::from(root_path));
                Ok(ResponseCommand::Ok)
            }

            RequestCommand::GetWorkspaceExists { workspace_id, .. } => {
                Ok(ResponseCommand::WorkspaceExists { exists: self.state.workspace_exists(&workspace_id) })
            }

            RequestCommand::GetWorkspaceRepositories { workspace_id } => {
                Ok(ResponseCommand::WorkspaceRepositories { repository_ids: self.state.workspace_repositories(&workspace_id) })
            }

            RequestCommand::SyncRepository { workspace_id, repository_id, clone_url, local_path, branch } => {
                let path = Path::new(&local_path);
                let mut link = self
                    .state
                    .link(&repository_id)
                    .unwrap_or_else(|| WorkspaceRepositoryLink::new(workspace_id.clone(), repository_id.clone()));

                let was_cloned = !path.join(".git").exists();
                if was_cloned {
                    self.vcs.clone_repo(&clone_url, path, branch.as_deref()).await?;
                } else {
                    self.vcs.fetch(path).await?;
                }
                if let Some(branch) = &branch {
                    self.vcs.checkout(path, branch).await?;
                }
                let current_branch = self.vcs.current_branch(path).await.ok();
                let branch_for_version = current_branch.clone().unwrap_or_else(|| "main".to_string());
                let version = self.vcs.ahead_behind(path, &branch_for_version).await?;
                let has_upstream = self.vcs.has_upstream(path, &branch_for_version).await.unwrap_or(false);
                let branches = self
                    .vcs
                    .list_branches(path)
                    .await
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| graymoon_core::RepositoryBranch { name: b.name, is_default: b.is_default, head_sha: b.head_sha })
                    .collect();
                let (projects, dependencies) = crate::project_refresh::refresh(path);

                link.local_path = Some(local_path);
                link.current_branch = Some(version.branch.clone());
                link.version = Some(version.head_sha.clone());
                link.ahead = version.ahead;
                link.behind = version.behind;
                link.has_upstream = has_upstream;
                link.branches = branches;
                link.status = LinkSyncStatus::InSync;
                link.last_error = None;
                link.project_count = projects.len() as u32;
                self.state.record_link(workspace_id, link.clone());
                Ok(ResponseCommand::SyncRepository { link, was_cloned, projects, dependencies })
            }

            RequestCommand::RefreshRepositoryVersion { local_path, branch, .. }
            | RequestCommand::GetRepositoryVersion { local_path, branch, .. } => {
                let version = self.vcs.ahead_behind(Path::new(&local_path), &branch).await?;
                Ok(ResponseCommand::RepositoryVersion { version })
            }

            RequestCommand::RefreshRepositoryProjects { local_path, .. } => {
                let (projects, dependencies) = crate::project_refresh::refresh(Path::new(&local_path));
                Ok(ResponseCommand::RepositoryProjects { projects, dependencies })
            }

            RequestCommand::PushRepository { local_path, branch, force_with_lease, .. } => {
                self.vcs.push(Path::new(&local_path), &branch, force_with_lease).await?;
                let version = self.vcs.ahead_behind(Path::new(&local_path), &branch).await?;
                Ok(ResponseCommand::Pushed { version })
            }

            RequestCommand::CommitSyncRepository { local_path, message, .. } => {
                let sha = self.vcs.commit_all(Path::new(&local_path), &message).await?;
                Ok(ResponseCommand::CommitSynced { sha })
            }

            RequestCommand::SyncRepositoryDependencies { local_path, dependencies, .. } => {
                let updated_count = crate::project_refresh::sync_dependencies(Path::new(&local_path), &dependencies)?;
                Ok(ResponseCommand::DependenciesSynced { updated_count })
            }

            RequestCommand::CheckoutBranch { local_path, branch, .. } => {
                self.vcs.checkout(Path::new(&local_path), &branch).await?;
                Ok(ResponseCommand::Ok)
            }

            RequestCommand::CreateBranch { local_path, branch, from, .. } => {
                self.vcs.create_branch(Path::new(&local_path), &branch, from.as_deref()).await?;
                Ok(ResponseCommand::BranchCreated { branch })
            }

            RequestCommand::SyncToDefaultBranch { local_path, .. } => {
                let path = Path::new(&local_path);
                let default = self.vcs.default_branch(path).await?;
                self.vcs.checkout(path, &default).await?;
                self.vcs.fetch(path).await?;
                Ok(ResponseCommand::DefaultBranchSynced { branch: default })
            }

            RequestCommand::RefreshBranches { local_path, .. } => {
                let branches = self
                    .vcs
                    .list_branches(Path::new(&local_path))
                    .await?
                    .into_iter()
                    .map(|b| graymoon_core::RepositoryBranch { name: b.name, is_default: b.is_default, head_sha: b.head_sha })
                    .collect();
                Ok(ResponseCommand::Branches { branches })
            }
        }
    }
}
