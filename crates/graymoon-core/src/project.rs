//! Workspace-local project model and inter-project dependency edges.

use crate::ids::{DependencyEdgeId, LinkId, ProjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    Executable,
    Test,
    Service,
    Package,
    Library,
}

crate::simple_display! {
    ProjectKind {
        Executable => "executable",
        Test => "test",
        Service => "service",
        Package => "package",
        Library => "library",
    }
}

/// A buildable unit discovered inside a repository by the project-file
/// parser, identified by the package id declared in its own manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceProject {
    pub id: ProjectId,
    pub link_id: LinkId,
    pub package_id: String,
    pub name: String,
    pub kind: ProjectKind,
    pub version: Option<String>,
    pub manifest_path: String,
}

impl WorkspaceProject {
    pub fn new(
        link_id: LinkId,
        package_id: impl Into<String>,
        name: impl Into<String>,
        kind: ProjectKind,
        manifest_path: impl Into<String>,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            link_id,
            package_id: package_id.into(),
            name: name.into(),
            kind,
            version: None,
            manifest_path: manifest_path.into(),
        }
    }

    crate::setters! {
        option { version: String }
    }
}

/// An edge from a dependent project to the package id it references, as
/// declared in the dependent's manifest. `resolved_project_id` is filled in
/// once the dependency solver matches the reference to a known project in
/// the same workspace; it stays `None` for external (unmatched) packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDependency {
    pub id: DependencyEdgeId,
    pub dependent_project_id: ProjectId,
    pub package_id: String,
    pub requested_version: Option<String>,
    pub resolved_project_id: Option<ProjectId>,
}

impl ProjectDependency {
    pub fn new(
        dependent_project_id: ProjectId,
        package_id: impl Into<String>,
        requested_version: Option<String>,
    ) -> Self {
        Self {
            id: DependencyEdgeId::new(),
            dependent_project_id,
            package_id: package_id.into(),
            requested_version,
            resolved_project_id: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.resolved_project_id.is_some()
    }
}
