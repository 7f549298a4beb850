//! Persistent entity storage. A minimal `Store` trait behind which a real
//! database could sit; today's only implementation keeps everything in
//! memory, behind a swappable trait since Control, unlike the agent, has
//! no single authoritative process-local state shape worth hardcoding.

pub mod in_memory;

use async_trait::async_trait;
use graymoon_core::{
    Connector, ConnectorId, ProjectDependency, ProjectId, Repository, RepositoryId, Result, Workspace, WorkspaceId,
    WorkspaceProject, WorkspaceRepositoryLink,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_workspace(&self, workspace: Workspace) -> Result<()>;
    async fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace>;
    async fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    async fn create_repository(&self, repository: Repository) -> Result<()>;
    async fn get_repository(&self, id: &RepositoryId) -> Result<Repository>;

    async fn create_connector(&self, connector: Connector) -> Result<()>;
    async fn get_connector(&self, id: &ConnectorId) -> Result<Connector>;
    async fn list_connectors(&self) -> Result<Vec<Connector>>;

    /// Insert or replace the link for `(workspace_id, repository_id)`.
    async fn upsert_link(&self, link: WorkspaceRepositoryLink) -> Result<()>;
    async fn get_link(&self, workspace_id: &WorkspaceId, repository_id: &RepositoryId) -> Result<WorkspaceRepositoryLink>;
    async fn list_links(&self, workspace_id: &WorkspaceId) -> Result<Vec<WorkspaceRepositoryLink>>;
    /// All links for a repository, across every workspace it has been added to.
    async fn list_links_for_repository(&self, repository_id: &RepositoryId) -> Result<Vec<WorkspaceRepositoryLink>>;

    /// Replace the full project/dependency set discovered for one link.
    async fn replace_projects(
        &self,
        link_id: &graymoon_core::LinkId,
        projects: Vec<WorkspaceProject>,
        dependencies: Vec<ProjectDependency>,
    ) -> Result<()>;
    async fn list_projects(&self, workspace_id: &WorkspaceId) -> Result<Vec<WorkspaceProject>>;
    async fn list_dependencies(&self, workspace_id: &WorkspaceId) -> Result<Vec<ProjectDependency>>;
    async fn get_project(&self, id: &ProjectId) -> Result<WorkspaceProject>;
}
