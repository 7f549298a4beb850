//! In-memory bookkeeping the agent keeps about the workspaces and
//! repositories it has been asked to manage. Not persisted: a restarted
//! agent is reseeded the next time control sends `EnsureWorkspace` /
//! `SyncRepository` for each link it cares about.

use graymoon_core::{RepositoryId, WorkspaceId, WorkspaceRepositoryLink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Default)]
pub struct AgentState {
    workspace_roots: Mutex<HashMap<WorkspaceId, PathBuf>>,
    links: Mutex<HashMap<RepositoryId, WorkspaceRepositoryLink>>,
    memberships: Mutex<HashMap<WorkspaceId, Vec<RepositoryId>>>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_workspace(&self, workspace_id: WorkspaceId, root_path: PathBuf) {
        self.workspace_roots.lock().insert(workspace_id, root_path);
    }

    pub fn workspace_root(&self, workspace_id: &WorkspaceId) -> Option<PathBuf> {
        self.workspace_roots.lock().get(workspace_id).cloned()
    }

    pub fn workspace_exists(&self, workspace_id: &WorkspaceId) -> bool {
        self.workspace_roots.lock().contains_key(workspace_id)
    }

    pub fn record_link(&self, workspace_id: WorkspaceId, link: WorkspaceRepositoryLink) {
        let repository_id = link.repository_id.clone();
        self.links.lock().insert(repository_id.clone(), link);
        let mut memberships = self.memberships.lock();
        let repos = memberships.entry(workspace_id).or_default();
        if !repos.contains(&repository_id) {
            repos.push(repository_id);
        }
    }

    pub fn link(&self, repository_id: &RepositoryId) -> Option<WorkspaceRepositoryLink> {
        self.links.lock().get(repository_id).cloned()
    }

    pub fn update_link<F: FnOnce(&mut WorkspaceRepositoryLink)>(&self, repository_id: &RepositoryId, f: F) {
        if let Some(link) = self.links.lock().get_mut(repository_id) {
            f(link);
        }
    }

    pub fn workspace_repositories(&self, workspace_id: &WorkspaceId) -> Vec<RepositoryId> {
        self.memberships.lock().get(workspace_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graymoon_core::WorkspaceRepositoryLink;

    #[test]
    fn records_membership_once_per_repository() {
        let state = AgentState::new();
        let workspace_id = WorkspaceId::new();
        let repository_id = RepositoryId::new();
        let link = WorkspaceRepositoryLink::new(workspace_id.clone(), repository_id.clone());

        state.record_link(workspace_id.clone(), link.clone());
        state.record_link(workspace_id.clone(), link);

        assert_eq!(state.workspace_repositories(&workspace_id), vec![repository_id]);
    }
}
