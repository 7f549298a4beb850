//! Dependency-ordered push. The hardest coordination algorithm in the
//! system: pushes repos level-by-level, optionally waiting for a lower
//! level's packages to land in a registry before pushing the next level.

use crate::agent_bridge::AgentBridge;
use crate::broadcast::Broadcast;
use crate::registry_prober::RegistryProber;
use crate::store::Store;
use futures_util::future::join_all;
use graymoon_core::{ConnectorKind, GrayMoonError, LinkSyncStatus, RepositoryId, Result, WorkspaceId};
use graymoon_wire::{RequestCommand, ResponseCommand};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT_MINUTES_PER_DEP: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct RequiredPackage {
    pub package_id: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct PushPlanEntry {
    pub repository_id: RepositoryId,
    pub repository_name: String,
    pub dependency_level: u32,
    pub required_packages: Vec<RequiredPackage>,
    pub local_path: String,
    pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushProgress {
    WaitingForDependencies { level: u32, satisfied: usize, total: usize },
    PushingLevel { level: u32 },
    LevelComplete { level: u32 },
    Done,
}

#[derive(Debug, Default)]
pub struct PushOutcome {
    pub pushed: Vec<RepositoryId>,
    pub errors: HashMap<RepositoryId, String>,
    pub synchronized: bool,
}

pub struct PushScheduler {
    store: Arc<dyn Store>,
    bridge: Arc<AgentBridge>,
    broadcast: Arc<Broadcast>,
    prober: RegistryProber,
    max_concurrent_git_ops: usize,
    timeout_minutes_per_dep: f64,
}

impl PushScheduler {
    pub fn new(store: Arc<dyn Store>, bridge: Arc<AgentBridge>, broadcast: Arc<Broadcast>) -> Self {
        Self {
            store,
            bridge,
            broadcast,
            prober: RegistryProber::new(),
            max_concurrent_git_ops: 8,
            timeout_minutes_per_dep: DEFAULT_TIMEOUT_MINUTES_PER_DEP,
        }
    }

    pub fn with_concurrency(mut self, max_concurrent_git_ops: usize) -> Self {
        self.max_concurrent_git_ops = max_concurrent_git_ops.max(1);
        self
    }

    pub fn with_timeout_minutes_per_dependency(mut self, minutes: f64) -> Self {
        self.timeout_minutes_per_dep = minutes;
        self
    }

    pub async fn push_workspace(
        &self,
        workspace_id: &WorkspaceId,
        repo_subset: Option<&HashSet<RepositoryId>>,
        progress: impl Fn(PushProgress) + Send + Sync,
        cancel: &CancellationToken,
    ) -> Result<PushOutcome> {
        if !self.bridge.is_agent_connected().await {
            return Err(GrayMoonError::AgentDisconnected);
        }

        if let Err(err) = crate::dependency_solver::solve_and_persist(self.store.as_ref(), workspace_id).await {
            warn!(workspace_id = %workspace_id.as_str(), error = %err, "dependency solve failed before push");
        }

        let (plan, producers) = self.build_plan(workspace_id, repo_subset).await?;
        if plan.is_empty() {
            info!(workspace_id = %workspace_id.as_str(), "nothing to push");
            return Ok(PushOutcome::default());
        }

        let connectors = self.active_package_registry_connectors().await?;
        let matched = self.match_packages(&plan, &connectors).await;
        let synchronized = self.can_synchronize(&plan, &matched) && !connectors.is_empty();

        let mut outcome = PushOutcome { synchronized, ..Default::default() };

        if synchronized {
            self.push_synchronized(workspace_id, plan, &producers, &matched, &connectors, &progress, cancel, &mut outcome).await;
        } else {
            self.push_non_synchronized(workspace_id, plan, &progress, cancel, &mut outcome).await;
        }

        progress(PushProgress::Done);
        Ok(outcome)
    }

    async fn build_plan(
        &self,
        workspace_id: &WorkspaceId,
        repo_subset: Option<&HashSet<RepositoryId>>,
    ) -> Result<(Vec<PushPlanEntry>, HashMap<String, RepositoryId>)> {
        let links = self.store.list_links(workspace_id).await?;
        let projects = self.store.list_projects(workspace_id).await?;
        let dependencies = self.store.list_dependencies(workspace_id).await?;

        let link_level: HashMap<_, _> = links.iter().map(|l| (l.repository_id.clone(), l.dependency_level)).collect();

        let project_repo: HashMap<_, _> = projects
            .iter()
            .map(|p| (p.id.clone(), links.iter().find(|l| l.id == p.link_id).map(|l| l.repository_id.clone())))
            .collect();

        let mut required: HashMap<RepositoryId, BTreeMap<(String, String), RequiredPackage>> = HashMap::new();
        for dep in &dependencies {
            let Some(Some(Some(dependent_repo))) =
                projects.iter().find(|p| p.id == dep.dependent_project_id).map(|p| project_repo.get(&p.id).cloned())
            else {
                continue;
            };
            let Some(referenced_project_id) = &dep.resolved_project_id else { continue };
            let Some(Some(referenced_repo)) = project_repo.get(referenced_project_id).cloned() else { continue };
            if referenced_repo == dependent_repo {
                continue;
            }
            let referenced_level = link_level.get(&referenced_repo).copied().flatten();
            let dependent_level = link_level.get(&dependent_repo).copied().flatten();
            let is_lower = matches!((referenced_level, dependent_level), (Some(r), Some(d)) if r < d);
            if !is_lower {
                continue;
            }
            let referenced_project = projects.iter().find(|p| p.id == *referenced_project_id);
            let Some(version) = referenced_project.and_then(|p| p.version.clone()) else { continue };
            required.entry(dependent_repo).or_default().insert(
                (referenced_project.unwrap().package_id.clone(), version.clone()),
                RequiredPackage { package_id: referenced_project.unwrap().package_id.clone(), version },
            );
        }

        let mut plan = Vec::new();
        for link in &links {
            if let Some(subset) = repo_subset {
                if !subset.contains(&link.repository_id) {
                    continue;
                }
            }
            let Some(level) = link.dependency_level else { continue };
            let Some(local_path) = link.local_path.clone() else { continue };
            if link.ahead == 0 {
                continue;
            }
            let repository = self.store.get_repository(&link.repository_id).await?;
            plan.push(PushPlanEntry {
                repository_id: link.repository_id.clone(),
                repository_name: repository.name.clone(),
                dependency_level: level,
                required_packages: required.get(&link.repository_id).map(|m| m.values().cloned().collect()).unwrap_or_default(),
                local_path,
                branch: link.current_branch.clone().unwrap_or_else(|| "main".to_string()),
            });
        }
        plan.sort_by(|a, b| a.dependency_level.cmp(&b.dependency_level).then(a.repository_name.cmp(&b.repository_name)));

        let mut producers: HashMap<String, RepositoryId> = HashMap::new();
        for project in &projects {
            if let Some(Some(repo_id)) = project_repo.get(&project.id) {
                producers.insert(project.package_id.clone(), repo_id.clone());
            }
        }

        Ok((plan, producers))
    }

    async fn active_package_registry_connectors(&self) -> Result<Vec<graymoon_core::Connector>> {
        let connectors = self.store.list_connectors().await?;
        Ok(connectors.into_iter().filter(|c| c.active && c.kind == ConnectorKind::PackageRegistry).collect())
    }

    /// First connector (in configured/store order) that reports the
    /// package as present wins; `None` if no connector matches.
    async fn match_packages(
        &self,
        plan: &[PushPlanEntry],
        connectors: &[graymoon_core::Connector],
    ) -> HashMap<String, Option<graymoon_core::ConnectorId>> {
        let mut matched = HashMap::new();
        let mut package_ids: Vec<String> =
            plan.iter().flat_map(|entry| entry.required_packages.iter().map(|p| p.package_id.clone())).collect();
        package_ids.sort();
        package_ids.dedup();

        for package_id in package_ids {
            let mut found = None;
            for connector in connectors {
                if self.prober.package_exists(connector, &package_id).await {
                    found = Some(connector.id.clone());
                    break;
                }
            }
            matched.insert(package_id, found);
        }
        matched
    }

    fn can_synchronize(&self, plan: &[PushPlanEntry], matched: &HashMap<String, Option<graymoon_core::ConnectorId>>) -> bool {
        plan.iter()
            .flat_map(|entry| entry.required_packages.iter())
            .all(|pkg| matches!(matched.get(&pkg.package_id), Some(Some(_))))
    }

    #[allow(clippy::too_many_arguments)]
    async fn push_synchronized(
        &self,
        workspace_id: &WorkspaceId,
        plan: Vec<PushPlanEntry>,
        producers: &HashMap<String, RepositoryId>,
        matched: &HashMap<String, Option<graymoon_core::ConnectorId>>,
        connectors: &[graymoon_core::Connector],
        progress: &(impl Fn(PushProgress) + Send + Sync),
        cancel: &CancellationToken,
        outcome: &mut PushOutcome,
    ) {
        let mut by_level: BTreeMap<u32, Vec<PushPlanEntry>> = BTreeMap::new();
        for entry in plan {
            by_level.entry(entry.dependency_level).or_default().push(entry);
        }

        let mut failed_repos: HashSet<RepositoryId> = HashSet::new();

        for (level, entries) in by_level {
            if cancel.is_cancelled() {
                return;
            }

            let entries: Vec<PushPlanEntry> =
                entries.into_iter().filter(|e| !depends_on_failed(e, producers, &failed_repos)).collect();
            if entries.is_empty() {
                continue;
            }

            let mut required: Vec<RequiredPackage> = entries.iter().flat_map(|e| e.required_packages.clone()).collect();
            required.sort_by(|a, b| (a.package_id.clone(), a.version.clone()).cmp(&(b.package_id.clone(), b.version.clone())));
            required.dedup_by(|a, b| a.package_id == b.package_id && a.version == b.version);

            if !required.is_empty() {
                let unsatisfied = self.wait_for_packages(level, &required, matched, connectors, progress, cancel).await;
                if let Some(missing) = unsatisfied.into_iter().next() {
                    let err = GrayMoonError::DependencyUnsatisfied { package: missing.package_id, version: missing.version };
                    for entry in &entries {
                        outcome.errors.insert(entry.repository_id.clone(), err.to_string());
                        failed_repos.insert(entry.repository_id.clone());
                        self.mark_error(workspace_id, &entry.repository_id, &err.to_string()).await;
                    }
                    return;
                }
            }

            progress(PushProgress::PushingLevel { level });
            self.push_batch(workspace_id, &entries, outcome, &mut failed_repos, cancel).await;

            if cancel.is_cancelled() {
                return;
            }

            self.refresh_and_broadcast(workspace_id, &entries, outcome, cancel).await;
            progress(PushProgress::LevelComplete { level });
        }
    }

    async fn push_non_synchronized(
        &self,
        workspace_id: &WorkspaceId,
        plan: Vec<PushPlanEntry>,
        progress: &(impl Fn(PushProgress) + Send + Sync),
        cancel: &CancellationToken,
        outcome: &mut PushOutcome,
    ) {
        if cancel.is_cancelled() {
            return;
        }
        progress(PushProgress::PushingLevel { level: 0 });
        let mut failed = HashSet::new();
        self.push_batch(workspace_id, &plan, outcome, &mut failed, cancel).await;
        self.refresh_and_broadcast(workspace_id, &plan, outcome, cancel).await;
    }

    /// Poll every required package until all are satisfied or the combined
    /// timeout elapses. Returns the packages still missing; empty means
    /// every dependency landed. Cancellation returns whatever is still
    /// outstanding at that point, same as a timeout.
    async fn wait_for_packages(
        &self,
        level: u32,
        required: &[RequiredPackage],
        matched: &HashMap<String, Option<graymoon_core::ConnectorId>>,
        connectors: &[graymoon_core::Connector],
        progress: &(impl Fn(PushProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Vec<RequiredPackage> {
        let total = required.len();
        let timeout = Duration::from_secs_f64(total as f64 * self.timeout_minutes_per_dep * 60.0);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut remaining: HashMap<(String, String), RequiredPackage> =
            required.iter().map(|p| ((p.package_id.clone(), p.version.clone()), p.clone())).collect();

        loop {
            for pkg in required {
                let key = (pkg.package_id.clone(), pkg.version.clone());
                if !remaining.contains_key(&key) {
                    continue;
                }
                let Some(Some(connector_id)) = matched.get(&pkg.package_id) else { continue };
                let Some(connector) = connectors.iter().find(|c| &c.id == connector_id) else { continue };
                if self.prober.package_version_exists(connector, &pkg.package_id, &pkg.version).await {
                    remaining.remove(&key);
                }
            }

            if remaining.is_empty() {
                return Vec::new();
            }

            progress(PushProgress::WaitingForDependencies { level, satisfied: total - remaining.len(), total });

            if cancel.is_cancelled() || tokio::time::Instant::now() >= deadline {
                return remaining.into_values().collect();
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = cancel.cancelled() => return remaining.into_values().collect(),
            }
        }
    }

    async fn push_batch(
        &self,
        workspace_id: &WorkspaceId,
        entries: &[PushPlanEntry],
        outcome: &mut PushOutcome,
        failed: &mut HashSet<RepositoryId>,
        cancel: &CancellationToken,
    ) {
        for chunk in entries.chunks(self.max_concurrent_git_ops) {
            let futures = chunk.iter().map(|entry| self.push_one(entry, cancel));
            let results = join_all(futures).await;
            for (entry, result) in chunk.iter().zip(results) {
                match result {
                    Ok(()) => outcome.pushed.push(entry.repository_id.clone()),
                    Err(err) => {
                        warn!(repository = %entry.repository_name, error = %err, "push failed");
                        outcome.errors.insert(entry.repository_id.clone(), err.to_string());
                        failed.insert(entry.repository_id.clone());
                        self.mark_error(workspace_id, &entry.repository_id, &err.to_string()).await;
                    }
                }
            }
        }
    }

    async fn push_one(&self, entry: &PushPlanEntry, cancel: &CancellationToken) -> Result<()> {
        let response = self
            .bridge
            .send_command_with_cancel(
                RequestCommand::PushRepository {
                    repository_id: entry.repository_id.clone(),
                    local_path: entry.local_path.clone(),
                    branch: entry.branch.clone(),
                    force_with_lease: false,
                },
                cancel,
            )
            .await;
        if response.success {
            Ok(())
        } else {
            Err(GrayMoonError::InternalError(response.error.unwrap_or_else(|| "push failed".to_string())))
        }
    }

    async fn refresh_and_broadcast(
        &self,
        workspace_id: &WorkspaceId,
        entries: &[PushPlanEntry],
        outcome: &PushOutcome,
        cancel: &CancellationToken,
    ) {
        for entry in entries {
            if !outcome.pushed.contains(&entry.repository_id) {
                continue;
            }
            let response = self
                .bridge
                .send_command_with_cancel(
                    RequestCommand::RefreshRepositoryVersion {
                        repository_id: entry.repository_id.clone(),
                        local_path: entry.local_path.clone(),
                        branch: entry.branch.clone(),
                    },
                    cancel,
                )
                .await;
            if let Some(ResponseCommand::RepositoryVersion { version }) = response.data {
                if let Ok(mut link) = self.store.get_link(workspace_id, &entry.repository_id).await {
                    link.current_branch = Some(version.branch);
                    link.version = Some(version.head_sha);
                    link.ahead = version.ahead;
                    link.behind = version.behind;
                    link.status = LinkSyncStatus::InSync;
                    link.last_error = None;
                    let _ = self.store.upsert_link(link).await;
                }
            }
        }
        self.broadcast.publish(workspace_id);
    }

    async fn mark_error(&self, workspace_id: &WorkspaceId, repository_id: &RepositoryId, message: &str) {
        if let Ok(mut link) = self.store.get_link(workspace_id, repository_id).await {
            link.status = LinkSyncStatus::Error;
            link.last_error = Some(message.to_string());
            let _ = self.store.upsert_link(link).await;
        }
    }
}

/// A repo is gated once any package it requires is produced by a repo that
/// already failed this run (its own failure, or a failure of a repo it
/// transitively depends on).
fn depends_on_failed(entry: &PushPlanEntry, producers: &HashMap<String, RepositoryId>, failed: &HashSet<RepositoryId>) -> bool {
    if failed.contains(&entry.repository_id) {
        return true;
    }
    entry.required_packages.iter().any(|pkg| producers.get(&pkg.package_id).is_some_and(|repo| failed.contains(repo)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_hub::RpcHub;
    use crate::store::in_memory::InMemoryStore;
    use graymoon_core::{Repository, Workspace, WorkspaceRepositoryLink};

    fn scheduler_with_disconnected_agent(store: Arc<dyn Store>) -> PushScheduler {
        let (hub, _notifies) = RpcHub::new();
        let bridge = Arc::new(AgentBridge::new(hub));
        PushScheduler::new(store, bridge, Arc::new(Broadcast::new()))
    }

    #[tokio::test]
    async fn push_fails_fast_without_agent_connection() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let scheduler = scheduler_with_disconnected_agent(store);
        let workspace_id = WorkspaceId::new();
        let cancel = CancellationToken::new();

        let result = scheduler.push_workspace(&workspace_id, None, |_| {}, &cancel).await;
        assert!(matches!(result, Err(GrayMoonError::AgentDisconnected)));
    }

    #[tokio::test]
    async fn unleveled_link_is_excluded_from_the_plan() {
        let store = InMemoryStore::new();
        let workspace = Workspace::new("demo");
        store.create_workspace(workspace.clone()).await.unwrap();
        let connector_id = graymoon_core::ConnectorId::new();
        let repo = Repository::new(connector_id, "org", "unsolved", "git@x:unsolved.git");
        store.create_repository(repo.clone()).await.unwrap();
        let mut link = WorkspaceRepositoryLink::new(workspace.id.clone(), repo.id.clone());
        link.local_path = Some("/tmp/unsolved".to_string());
        store.upsert_link(link).await.unwrap();

        let store: Arc<dyn Store> = Arc::new(store);
        let scheduler = scheduler_with_disconnected_agent(store.clone());
        let (plan, _producers) = scheduler.build_plan(&workspace.id, None).await.unwrap();
        assert!(plan.is_empty(), "link with no dependency_level must not enter the push plan");
    }
}
