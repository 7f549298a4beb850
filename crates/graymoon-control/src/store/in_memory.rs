//! In-memory `Store` implementation. Enough to drive the whole control
//! surface for development and tests; a real deployment swaps this for a
//! database-backed implementation of the same trait.

use super::Store;
use async_trait::async_trait;
use graymoon_core::{
    Connector, ConnectorId, GrayMoonError, LinkId, ProjectDependency, ProjectId, Repository, RepositoryId, Result,
    Workspace, WorkspaceId, WorkspaceProject, WorkspaceRepositoryLink,
};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryStore {
    workspaces: Mutex<HashMap<WorkspaceId, Workspace>>,
    repositories: Mutex<HashMap<RepositoryId, Repository>>,
    connectors: Mutex<HashMap<ConnectorId, Connector>>,
    links: Mutex<HashMap<(WorkspaceId, RepositoryId), WorkspaceRepositoryLink>>,
    projects: Mutex<HashMap<LinkId, Vec<WorkspaceProject>>>,
    dependencies: Mutex<HashMap<LinkId, Vec<ProjectDependency>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_workspace(&self, workspace: Workspace) -> Result<()> {
        self.workspaces.lock().insert(workspace.id.clone(), workspace);
        Ok(())
    }

    async fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace> {
        self.workspaces.lock().get(id).cloned().ok_or_else(|| GrayMoonError::not_found("workspace", id.as_str()))
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        Ok(self.workspaces.lock().values().cloned().collect())
    }

    async fn create_repository(&self, repository: Repository) -> Result<()> {
        self.repositories.lock().insert(repository.id.clone(), repository);
        Ok(())
    }

    async fn get_repository(&self, id: &RepositoryId) -> Result<Repository> {
        self.repositories.lock().get(id).cloned().ok_or_else(|| GrayMoonError::not_found("repository", id.as_str()))
    }

    async fn create_connector(&self, connector: Connector) -> Result<()> {
        self.connectors.lock().insert(connector.id.clone(), connector);
        Ok(())
    }

    async fn get_connector(&self, id: &ConnectorId) -> Result<Connector> {
        self.connectors.lock().get(id).cloned().ok_or_else(|| GrayMoonError::not_found("connector", id.as_str()))
    }

    async fn list_connectors(&self) -> Result<Vec<Connector>> {
        Ok(self.connectors.lock().values().cloned().collect())
    }

    async fn upsert_link(&self, link: WorkspaceRepositoryLink) -> Result<()> {
        self.links.lock().insert((link.workspace_id.clone(), link.repository_id.clone()), link);
        Ok(())
    }

    async fn get_link(&self, workspace_id: &WorkspaceId, repository_id: &RepositoryId) -> Result<WorkspaceRepositoryLink> {
        self.links
            .lock()
            .get(&(workspace_id.clone(), repository_id.clone()))
            .cloned()
            .ok_or_else(|| GrayMoonError::not_found("workspace_repository_link", repository_id.as_str()))
    }

    async fn list_links(&self, workspace_id: &WorkspaceId) -> Result<Vec<WorkspaceRepositoryLink>> {
        Ok(self.links.lock().values().filter(|l| &l.workspace_id == workspace_id).cloned().collect())
    }

    async fn list_links_for_repository(&self, repository_id: &RepositoryId) -> Result<Vec<WorkspaceRepositoryLink>> {
        Ok(self.links.lock().values().filter(|l| &l.repository_id == repository_id).cloned().collect())
    }

    async fn replace_projects(
        &self,
        link_id: &LinkId,
        projects: Vec<WorkspaceProject>,
        dependencies: Vec<ProjectDependency>,
    ) -> Result<()> {
        self.projects.lock().insert(link_id.clone(), projects);
        self.dependencies.lock().insert(link_id.clone(), dependencies);
        Ok(())
    }

    async fn list_projects(&self, workspace_id: &WorkspaceId) -> Result<Vec<WorkspaceProject>> {
        let link_ids: Vec<LinkId> =
            self.links.lock().values().filter(|l| &l.workspace_id == workspace_id).map(|l| l.id.clone()).collect();
        let projects = self.projects.lock();
        Ok(link_ids.iter().filter_map(|id| projects.get(id)).flatten().cloned().collect())
    }

    async fn list_dependencies(&self, workspace_id: &WorkspaceId) -> Result<Vec<ProjectDependency>> {
        let link_ids: Vec<LinkId> =
            self.links.lock().values().filter(|l| &l.workspace_id == workspace_id).map(|l| l.id.clone()).collect();
        let dependencies = self.dependencies.lock();
        Ok(link_ids.iter().filter_map(|id| dependencies.get(id)).flatten().cloned().collect())
    }

    async fn get_project(&self, id: &ProjectId) -> Result<WorkspaceProject> {
        self.projects
            .lock()
            .values()
            .flatten()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| GrayMoonError::not_found("workspace_project", id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_link() {
        let store = InMemoryStore::new();
        let workspace_id = WorkspaceId::new();
        let repository_id = RepositoryId::new();
        let link = WorkspaceRepositoryLink::new(workspace_id.clone(), repository_id.clone());
        store.upsert_link(link.clone()).await.unwrap();

        let fetched = store.get_link(&workspace_id, &repository_id).await.unwrap();
        assert_eq!(fetched.id, link.id);
    }

    #[tokio::test]
    async fn missing_workspace_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_workspace(&WorkspaceId::new()).await.unwrap_err();
        assert!(matches!(err, GrayMoonError::NotFound { .. }));
    }
}
