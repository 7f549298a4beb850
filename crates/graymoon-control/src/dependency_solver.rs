//! Collapses the workspace's project-level dependency edges into a
//! repository-level DAG, detects cycles, and assigns longest-path levels
//! so the push scheduler knows which repos can go out in parallel.

use graymoon_core::{LinkId, RepositoryId, Result, WorkspaceId};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

use crate::store::Store;

pub struct SolveOutcome {
    /// `None` for any repository on a cycle.
    pub levels: HashMap<RepositoryId, Option<u32>>,
    pub dependency_counts: HashMap<RepositoryId, u32>,
    pub unmatched_counts: HashMap<RepositoryId, u32>,
    pub cycles: Vec<Vec<RepositoryId>>,
}

/// Run the solver for one workspace and persist `dependency_level`,
/// `dependency_count`, and `unmatched_dependency_count` on every link.
pub async fn solve_and_persist(store: &dyn Store, workspace_id: &WorkspaceId) -> Result<SolveOutcome> {
    let outcome = solve(store, workspace_id).await?;

    for link in store.list_links(workspace_id).await? {
        let level = outcome.levels.get(&link.repository_id).copied().flatten();
        let deps = outcome.dependency_counts.get(&link.repository_id).copied().unwrap_or(0);
        let unmatched = outcome.unmatched_counts.get(&link.repository_id).copied().unwrap_or(0);
        let mut updated = link.with_dependency_counts(deps, unmatched);
        updated.dependency_level = level;
        store.upsert_link(updated).await?;
    }

    Ok(outcome)
}

pub async fn solve(store: &dyn Store, workspace_id: &WorkspaceId) -> Result<SolveOutcome> {
    let links = store.list_links(workspace_id).await?;
    let projects = store.list_projects(workspace_id).await?;
    let dependencies = store.list_dependencies(workspace_id).await?;

    let link_repo: HashMap<LinkId, RepositoryId> =
        links.iter().map(|l| (l.id.clone(), l.repository_id.clone())).collect();
    let project_repo: HashMap<_, _> =
        projects.iter().map(|p| (p.id.clone(), link_repo.get(&p.link_id).cloned())).collect();
    let project_current_version: HashMap<_, _> = projects.iter().map(|p| (p.id.clone(), p.version.clone())).collect();

    let mut repo_ids: Vec<RepositoryId> = links.iter().map(|l| l.repository_id.clone()).collect();
    repo_ids.sort();
    repo_ids.dedup();

    let mut graph: DiGraph<RepositoryId, ()> = DiGraph::new();
    let mut node_of: HashMap<RepositoryId, NodeIndex> = HashMap::new();
    for repo in &repo_ids {
        node_of.insert(repo.clone(), graph.add_node(repo.clone()));
    }

    let mut dependency_counts: HashMap<RepositoryId, u32> = HashMap::new();
    let mut unmatched_counts: HashMap<RepositoryId, u32> = HashMap::new();
    let mut seen_edges: HashSet<(RepositoryId, RepositoryId)> = HashSet::new();

    for dep in &dependencies {
        let Some(dependent_repo) = projects
            .iter()
            .find(|p| p.id == dep.dependent_project_id)
            .and_then(|p| project_repo.get(&p.id).cloned().flatten())
        else {
            continue;
        };
        let Some(referenced_project_id) = &dep.resolved_project_id else { continue };
        let Some(referenced_repo) = project_repo.get(referenced_project_id).cloned().flatten() else { continue };
        if referenced_repo == dependent_repo {
            continue;
        }

        *dependency_counts.entry(dependent_repo.clone()).or_insert(0) += 1;
        let referenced_version = project_current_version.get(referenced_project_id).cloned().flatten();
        if dep.requested_version != referenced_version {
            *unmatched_counts.entry(dependent_repo.clone()).or_insert(0) += 1;
        }

        let edge_key = (dependent_repo.clone(), referenced_repo.clone());
        if seen_edges.insert(edge_key) {
            let from = node_of[&dependent_repo];
            let to = node_of[&referenced_repo];
            graph.add_edge(from, to, ());
        }
    }

    let mut cycles = Vec::new();
    let mut levels: HashMap<RepositoryId, Option<u32>> = HashMap::new();

    if is_cyclic_directed(&graph) {
        let cyclic_repos = find_cyclic_nodes(&graph);
        for repo in &repo_ids {
            if cyclic_repos.contains(&node_of[repo]) {
                levels.insert(repo.clone(), None);
            }
        }
        if !cyclic_repos.is_empty() {
            let mut names: Vec<RepositoryId> = cyclic_repos.iter().map(|n| graph[*n].clone()).collect();
            names.sort();
            cycles.push(names);
        }
    }

    let acyclic_repos: Vec<&RepositoryId> = repo_ids.iter().filter(|r| !levels.contains_key(*r)).collect();
    for repo in &acyclic_repos {
        let level = longest_path_level(&graph, node_of[repo], &levels, &node_of);
        levels.insert((*repo).clone(), Some(level));
    }

    Ok(SolveOutcome { levels, dependency_counts, unmatched_counts, cycles })
}

fn find_cyclic_nodes(graph: &DiGraph<RepositoryId, ()>) -> HashSet<NodeIndex> {
    use petgraph::algo::kosaraju_scc;
    kosaraju_scc(graph).into_iter().filter(|scc| scc.len() > 1).flatten().collect()
}

/// `level(R) = 1 + max(level(R') for edges R -> R')`, `0` for sinks.
/// Cyclic nodes are excluded from the graph traversal entirely (`levels`
/// already marks them `None`), so only the acyclic subgraph is walked.
fn longest_path_level(
    graph: &DiGraph<RepositoryId, ()>,
    node: NodeIndex,
    resolved: &HashMap<RepositoryId, Option<u32>>,
    node_of: &HashMap<RepositoryId, NodeIndex>,
) -> u32 {
    let mut memo: HashMap<NodeIndex, u32> = HashMap::new();
    for (repo, level) in resolved {
        if let (Some(level), Some(idx)) = (level, node_of.get(repo)) {
            memo.insert(*idx, *level);
        }
    }
    compute_level(graph, node, &mut memo)
}

fn compute_level(graph: &DiGraph<RepositoryId, ()>, node: NodeIndex, memo: &mut HashMap<NodeIndex, u32>) -> u32 {
    if let Some(level) = memo.get(&node) {
        return *level;
    }
    let max_child = graph
        .neighbors_directed(node, Direction::Outgoing)
        .map(|child| compute_level(graph, child, memo))
        .max();
    let level = match max_child {
        Some(child_level) => child_level + 1,
        None => 0,
    };
    memo.insert(node, level);
    level
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::in_memory::InMemoryStore;
    use graymoon_core::{ProjectDependency, ProjectKind, Repository, Workspace, WorkspaceProject, WorkspaceRepositoryLink};

    async fn seed_two_repo_dependency() -> (InMemoryStore, WorkspaceId, RepositoryId, RepositoryId) {
        let store = InMemoryStore::new();
        let workspace = Workspace::new("demo");
        store.create_workspace(workspace.clone()).await.unwrap();

        let connector_id = graymoon_core::ConnectorId::new();
        let upstream = Repository::new(connector_id.clone(), "org", "core-lib", "git@x:core-lib.git");
        let downstream = Repository::new(connector_id, "org", "widgets", "git@x:widgets.git");
        store.create_repository(upstream.clone()).await.unwrap();
        store.create_repository(downstream.clone()).await.unwrap();

        let upstream_link = WorkspaceRepositoryLink::new(workspace.id.clone(), upstream.id.clone());
        let downstream_link = WorkspaceRepositoryLink::new(workspace.id.clone(), downstream.id.clone());
        store.upsert_link(upstream_link.clone()).await.unwrap();
        store.upsert_link(downstream_link.clone()).await.unwrap();

        let upstream_project =
            WorkspaceProject::new(upstream_link.id.clone(), "core-lib", "core-lib", ProjectKind::Library, "Cargo.toml")
                .version("1.0.0");
        let downstream_project =
            WorkspaceProject::new(downstream_link.id.clone(), "widgets", "widgets", ProjectKind::Library, "Cargo.toml");

        let mut dep = ProjectDependency::new(downstream_project.id.clone(), "core-lib", Some("1.0.0".to_string()));
        dep.resolved_project_id = Some(upstream_project.id.clone());

        store.replace_projects(&upstream_link.id, vec![upstream_project], vec![]).await.unwrap();
        store.replace_projects(&downstream_link.id, vec![downstream_project], vec![dep]).await.unwrap();

        (store, workspace.id, upstream.id, downstream.id)
    }

    #[tokio::test]
    async fn sink_is_level_zero_and_dependent_is_level_one() {
        let (store, workspace_id, upstream_id, downstream_id) = seed_two_repo_dependency().await;
        let outcome = solve(&store, &workspace_id).await.unwrap();

        assert_eq!(outcome.levels.get(&upstream_id).copied().flatten(), Some(0));
        assert_eq!(outcome.levels.get(&downstream_id).copied().flatten(), Some(1));
        assert_eq!(outcome.dependency_counts.get(&downstream_id).copied(), Some(1));
        assert_eq!(outcome.unmatched_counts.get(&downstream_id).copied().unwrap_or(0), 0);
        assert!(outcome.cycles.is_empty());
    }

    #[tokio::test]
    async fn mismatched_version_counts_as_unmatched() {
        let store = InMemoryStore::new();
        let workspace = Workspace::new("demo");
        store.create_workspace(workspace.clone()).await.unwrap();
        let connector_id = graymoon_core::ConnectorId::new();
        let upstream = Repository::new(connector_id.clone(), "org", "core-lib", "git@x:core-lib.git");
        let downstream = Repository::new(connector_id, "org", "widgets", "git@x:widgets.git");
        store.create_repository(upstream.clone()).await.unwrap();
        store.create_repository(downstream.clone()).await.unwrap();
        let upstream_link = WorkspaceRepositoryLink::new(workspace.id.clone(), upstream.id.clone());
        let downstream_link = WorkspaceRepositoryLink::new(workspace.id.clone(), downstream.id.clone());
        store.upsert_link(upstream_link.clone()).await.unwrap();
        store.upsert_link(downstream_link.clone()).await.unwrap();

        let upstream_project =
            WorkspaceProject::new(upstream_link.id.clone(), "core-lib", "core-lib", ProjectKind::Library, "Cargo.toml")
                .version("2.0.0");
        let downstream_project =
            WorkspaceProject::new(downstream_link.id.clone(), "widgets", "widgets", ProjectKind::Library, "Cargo.toml");
        let mut dep = ProjectDependency::new(downstream_project.id.clone(), "core-lib", Some("1.0.0".to_string()));
        dep.resolved_project_id = Some(upstream_project.id.clone());

        store.replace_projects(&upstream_link.id, vec![upstream_project], vec![]).await.unwrap();
        store.replace_projects(&downstream_link.id, vec![downstream_project], vec![dep]).await.unwrap();

        let outcome = solve(&store, &workspace.id).await.unwrap();
        assert_eq!(outcome.unmatched_counts.get(&downstream.id).copied(), Some(1));
    }

    #[tokio::test]
    async fn cycle_is_detected_and_marks_both_repos_unleveled() {
        let store = InMemoryStore::new();
        let workspace = Workspace::new("demo");
        store.create_workspace(workspace.clone()).await.unwrap();
        let connector_id = graymoon_core::ConnectorId::new();
        let a = Repository::new(connector_id.clone(), "org", "a", "git@x:a.git");
        let b = Repository::new(connector_id, "org", "b", "git@x:b.git");
        store.create_repository(a.clone()).await.unwrap();
        store.create_repository(b.clone()).await.unwrap();
        let link_a = WorkspaceRepositoryLink::new(workspace.id.clone(), a.id.clone());
        let link_b = WorkspaceRepositoryLink::new(workspace.id.clone(), b.id.clone());
        store.upsert_link(link_a.clone()).await.unwrap();
        store.upsert_link(link_b.clone()).await.unwrap();

        let project_a = WorkspaceProject::new(link_a.id.clone(), "a", "a", ProjectKind::Library, "Cargo.toml");
        let project_b = WorkspaceProject::new(link_b.id.clone(), "b", "b", ProjectKind::Library, "Cargo.toml");
        let mut dep_a_on_b = ProjectDependency::new(project_a.id.clone(), "b", None);
        dep_a_on_b.resolved_project_id = Some(project_b.id.clone());
        let mut dep_b_on_a = ProjectDependency::new(project_b.id.clone(), "a", None);
        dep_b_on_a.resolved_project_id = Some(project_a.id.clone());

        store.replace_projects(&link_a.id, vec![project_a], vec![dep_a_on_b]).await.unwrap();
        store.replace_projects(&link_b.id, vec![project_b], vec![dep_b_on_a]).await.unwrap();

        let outcome = solve(&store, &workspace.id).await.unwrap();
        assert_eq!(outcome.levels.get(&a.id).copied().flatten(), None);
        assert_eq!(outcome.levels.get(&b.id).copied().flatten(), None);
        assert_eq!(outcome.cycles.len(), 1);
    }
}
