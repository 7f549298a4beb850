//! Workspace entity and its links to repositories.

use crate::ids::{LinkId, RepositoryId, WorkspaceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: WorkspaceId::new(), name: name.into() }
    }
}

/// Branch known to exist on a repository as last reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryBranch {
    pub name: String,
    pub is_default: bool,
    pub head_sha: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSyncStatus {
    NeedsSync,
    InSync,
    NotCloned,
    VersionMismatch,
    Error,
}

crate::simple_display! {
    LinkSyncStatus {
        NeedsSync => "needs_sync",
        InSync => "in_sync",
        NotCloned => "not_cloned",
        VersionMismatch => "version_mismatch",
        Error => "error",
    }
}

/// Membership of a `Repository` inside a `Workspace`, plus last-known sync
/// state as reported by the agent resident on the workspace's host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRepositoryLink {
    pub id: LinkId,
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub local_path: Option<String>,
    pub current_branch: Option<String>,
    pub status: LinkSyncStatus,
    #[serde(default)]
    pub branches: Vec<RepositoryBranch>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// `None` when the repo sits on a dependency cycle or hasn't been
    /// solved yet; otherwise its longest-path level in the workspace DAG.
    #[serde(default)]
    pub dependency_level: Option<u32>,
    #[serde(default)]
    pub dependency_count: u32,
    #[serde(default)]
    pub unmatched_dependency_count: u32,
    /// Head commit sha of `current_branch` as last reported by the agent.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub project_count: u32,
    /// Commits on `current_branch` not yet on its upstream.
    #[serde(default)]
    pub ahead: u32,
    /// Commits on the upstream not yet merged into `current_branch`.
    #[serde(default)]
    pub behind: u32,
    #[serde(default)]
    pub has_upstream: bool,
}

impl WorkspaceRepositoryLink {
    pub fn new(workspace_id: WorkspaceId, repository_id: RepositoryId) -> Self {
        Self {
            id: LinkId::new(),
            workspace_id,
            repository_id,
            local_path: None,
            current_branch: None,
            status: LinkSyncStatus::NotCloned,
            branches: Vec::new(),
            last_error: None,
            dependency_level: None,
            dependency_count: 0,
            unmatched_dependency_count: 0,
            version: None,
            project_count: 0,
            ahead: 0,
            behind: 0,
            has_upstream: false,
        }
    }

    crate::setters! {
        set { status: LinkSyncStatus, branches: Vec<RepositoryBranch>, project_count: u32, ahead: u32, behind: u32, has_upstream: bool }
        option { local_path: String, current_branch: String, last_error: String, dependency_level: u32, version: String }
    }

    pub fn with_dependency_counts(mut self, dependencies: u32, unmatched: u32) -> Self {
        self.dependency_count = dependencies;
        self.unmatched_dependency_count = unmatched;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_link_starts_not_cloned() {
        let link = WorkspaceRepositoryLink::new(WorkspaceId::new(), RepositoryId::new());
        assert_eq!(link.status, LinkSyncStatus::NotCloned);
        assert!(link.branches.is_empty());
    }
}
