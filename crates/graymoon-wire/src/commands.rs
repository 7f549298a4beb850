//! Typed request/result payloads for every Control → Agent command.

use graymoon_core::{
    ProjectDependency, RepositoryBranch, RepositoryId, WorkspaceId, WorkspaceProject, WorkspaceRepositoryLink,
};
use serde::{Deserialize, Serialize};

/// Ahead/behind comparison of a local branch against its upstream, as
/// computed by the agent's VCS executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitVersion {
    pub branch: String,
    pub head_sha: String,
    pub ahead: u32,
    pub behind: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySyncEntry {
    pub package_id: String,
    pub resolved_version: String,
}

/// One request the Control Service can send down the RPC channel to an
/// agent. Tagged by `command` so the agent's dispatcher can route on the
/// name alone before deserializing the rest of the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command")]
pub enum RequestCommand {
    SyncRepository {
        workspace_id: WorkspaceId,
        repository_id: RepositoryId,
        clone_url: String,
        local_path: String,
        branch: Option<String>,
    },

    RefreshRepositoryVersion { repository_id: RepositoryId, local_path: String, branch: String },

    RefreshRepositoryProjects { repository_id: RepositoryId, local_path: String },

    EnsureWorkspace { workspace_id: WorkspaceId, root_path: String },

    GetWorkspaceRepositories { workspace_id: WorkspaceId },

    GetWorkspaceExists { workspace_id: WorkspaceId, root_path: String },

    GetRepositoryVersion { repository_id: RepositoryId, local_path: String, branch: String },

    PushRepository { repository_id: RepositoryId, local_path: String, branch: String, force_with_lease: bool },

    CommitSyncRepository { repository_id: RepositoryId, local_path: String, message: String },

    SyncRepositoryDependencies {
        repository_id: RepositoryId,
        local_path: String,
        dependencies: Vec<DependencySyncEntry>,
    },

    CheckoutBranch { repository_id: RepositoryId, local_path: String, branch: String },

    CreateBranch { repository_id: RepositoryId, local_path: String, branch: String, from: Option<String> },

    SyncToDefaultBranch { repository_id: RepositoryId, local_path: String },

    RefreshBranches { repository_id: RepositoryId, local_path: String },
}

impl RequestCommand {
    /// Stable command name, also used for dispatcher registration on the
    /// agent side (kept distinct from the `#[serde(tag)]` string so renaming
    /// the wire tag doesn't silently break dispatch table lookups).
    pub fn name(&self) -> &'static str {
        match self {
            RequestCommand::SyncRepository { .. } => "SyncRepository",
            RequestCommand::RefreshRepositoryVersion { .. } => "RefreshRepositoryVersion",
            RequestCommand::RefreshRepositoryProjects { .. } => "RefreshRepositoryProjects",
            RequestCommand::EnsureWorkspace { .. } => "EnsureWorkspace",
            RequestCommand::GetWorkspaceRepositories { .. } => "GetWorkspaceRepositories",
            RequestCommand::GetWorkspaceExists { .. } => "GetWorkspaceExists",
            RequestCommand::GetRepositoryVersion { .. } => "GetRepositoryVersion",
            RequestCommand::PushRepository { .. } => "PushRepository",
            RequestCommand::CommitSyncRepository { .. } => "CommitSyncRepository",
            RequestCommand::SyncRepositoryDependencies { .. } => "SyncRepositoryDependencies",
            RequestCommand::CheckoutBranch { .. } => "CheckoutBranch",
            RequestCommand::CreateBranch { .. } => "CreateBranch",
            RequestCommand::SyncToDefaultBranch { .. } => "SyncToDefaultBranch",
            RequestCommand::RefreshBranches { .. } => "RefreshBranches",
        }
    }
}

/// Result of executing a `RequestCommand`, sent back from agent to control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ResponseCommand {
    /// Generic success with no payload.
    Ok,

    SyncRepository {
        link: WorkspaceRepositoryLink,
        was_cloned: bool,
        projects: Vec<WorkspaceProject>,
        dependencies: Vec<ProjectDependency>,
    },

    RepositoryVersion { version: GitVersion },

    RepositoryProjects { projects: Vec<WorkspaceProject>, dependencies: Vec<ProjectDependency> },

    DependenciesSynced { updated_count: u32 },

    WorkspaceRepositories { repository_ids: Vec<RepositoryId> },

    WorkspaceExists { exists: bool },

    Pushed { version: GitVersion },

    CommitSynced { sha: String },

    BranchCreated { branch: String },

    DefaultBranchSynced { branch: String },

    Branches { branches: Vec<RepositoryBranch> },

    /// Carries `GrayMoonError::to_string()`; never unwinds across the RPC
    /// boundary, always serialized here instead.
    Error { message: String },
}

impl ResponseCommand {
    pub fn error(err: impl std::fmt::Display) -> Self {
        ResponseCommand::Error { message: err.to_string() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResponseCommand::Error { .. })
    }
}
