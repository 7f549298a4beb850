//! Discovers buildable projects inside a repository checkout by scanning
//! for manifest files and extracting their package id and dependencies.

use graymoon_core::{LinkId, ProjectDependency, ProjectKind, WorkspaceProject};
use std::path::{Path, PathBuf};

pub struct ParsedProject {
    pub project: WorkspaceProject,
    pub dependency_package_ids: Vec<(String, Option<String>)>,
}

pub trait ProjectFileParser: Send + Sync {
    /// Manifest file names this parser recognizes, e.g. `["Cargo.toml"]`.
    fn manifest_file_names(&self) -> &[&'static str];

    /// Parse one manifest file into a project plus its declared dependency
    /// package ids (version requirement, when present).
    fn parse(&self, link_id: LinkId, manifest_path: &Path, contents: &str) -> Option<ParsedProject>;
}

/// Finds every manifest matching any registered parser under `root`,
/// skipping `.git` and common vendor/build directories.
pub fn discover_manifests(root: &Path, parsers: &[Box<dyn ProjectFileParser>]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name == ".git" || name == "target" || name == "node_modules" {
                    continue;
                }
                stack.push(path);
            } else if file_type.is_file() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if parsers.iter().any(|p| p.manifest_file_names().contains(&name.as_ref())) {
                    found.push(path);
                }
            }
        }
    }
    found
}

/// Minimal `Cargo.toml` parser: pulls `[package] name`/`version` and
/// `[dependencies]` table keys as unversioned references.
pub struct CargoManifestParser;

impl ProjectFileParser for CargoManifestParser {
    fn manifest_file_names(&self) -> &[&'static str] {
        &["Cargo.toml"]
    }

    fn parse(&self, link_id: LinkId, manifest_path: &Path, contents: &str) -> Option<ParsedProject> {
        let value: toml::Value = contents.parse().ok()?;
        let package = value.get("package")?.as_table()?;
        let name = package.get("name")?.as_str()?.to_string();
        let version = package.get("version").and_then(|v| v.as_str()).map(str::to_string);
        let is_bin = value.get("bin").is_some() || manifest_path.parent().map(|p| p.join("src/main.rs").exists()).unwrap_or(false);
        let kind = if is_bin { ProjectKind::Executable } else { ProjectKind::Library };

        let mut project = WorkspaceProject::new(link_id, name.clone(), name, kind, manifest_path.to_string_lossy());
        if let Some(version) = version {
            project = project.version(version);
        }

        let mut deps = Vec::new();
        for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
            if let Some(table) = value.get(section).and_then(|v| v.as_table()) {
                for (dep_name, spec) in table {
                    let requested = match spec {
                        toml::Value::String(s) => Some(s.clone()),
                        toml::Value::Table(t) => t.get("version").and_then(|v| v.as_str()).map(str::to_string),
                        _ => None,
                    };
                    deps.push((dep_name.clone(), requested));
                }
            }
        }

        Some(ParsedProject { project, dependency_package_ids: deps })
    }
}

/// Minimal `package.json` parser: name/version plus `dependencies`.
pub struct NpmManifestParser;

impl ProjectFileParser for NpmManifestParser {
    fn manifest_file_names(&self) -> &[&'static str] {
        &["package.json"]
    }

    fn parse(&self, link_id: LinkId, manifest_path: &Path, contents: &str) -> Option<ParsedProject> {
        let value: serde_json::Value = serde_json::from_str(contents).ok()?;
        let name = value.get("name")?.as_str()?.to_string();
        let version = value.get("version").and_then(|v| v.as_str()).map(str::to_string);

        let mut project =
            WorkspaceProject::new(link_id, name.clone(), name, ProjectKind::Package, manifest_path.to_string_lossy());
        if let Some(version) = version {
            project = project.version(version);
        }

        let mut deps = Vec::new();
        for section in ["dependencies", "devDependencies"] {
            if let Some(obj) = value.get(section).and_then(|v| v.as_object()) {
                for (dep_name, spec) in obj {
                    deps.push((dep_name.clone(), spec.as_str().map(str::to_string)));
                }
            }
        }

        Some(ParsedProject { project, dependency_package_ids: deps })
    }
}

pub fn default_parsers() -> Vec<Box<dyn ProjectFileParser>> {
    vec![Box::new(CargoManifestParser), Box::new(NpmManifestParser)]
}

/// Resolve dependency references against the set of projects already
/// discovered in the same repository, leaving external packages unmatched.
pub fn link_dependencies(parsed: &[ParsedProject]) -> Vec<ProjectDependency> {
    let mut edges = Vec::new();
    for p in parsed {
        for (package_id, requested_version) in &p.dependency_package_ids {
            let mut dep = ProjectDependency::new(p.project.id.clone(), package_id.clone(), requested_version.clone());
            if let Some(target) = parsed.iter().find(|other| &other.project.package_id == package_id) {
                dep.resolved_project_id = Some(target.project.id.clone());
            }
            edges.push(dep);
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cargo_manifest_parses_name_and_deps() {
        let parser = CargoManifestParser;
        let contents = r#"
[package]
name = "widgets"
version = "0.2.0"

[dependencies]
serde = "1"
core-lib = { path = "../core-lib", version = "0.1" }
"#;
        let parsed = parser.parse(LinkId::new(), Path::new("/repo/widgets/Cargo.toml"), contents).unwrap();
        assert_eq!(parsed.project.package_id, "widgets");
        assert_eq!(parsed.project.version.as_deref(), Some("0.2.0"));
        assert_eq!(parsed.dependency_package_ids.len(), 2);
    }

    #[test]
    fn link_dependencies_matches_intra_repo_packages() {
        let link_id = LinkId::new();
        let core = CargoManifestParser
            .parse(link_id.clone(), Path::new("/repo/core/Cargo.toml"), "[package]\nname = \"core-lib\"\nversion = \"0.1.0\"")
            .unwrap();
        let widgets = CargoManifestParser
            .parse(
                link_id,
                Path::new("/repo/widgets/Cargo.toml"),
                "[package]\nname = \"widgets\"\nversion = \"0.2.0\"\n[dependencies]\ncore-lib = \"0.1\"\nexternal-crate = \"2\"",
            )
            .unwrap();

        let edges = link_dependencies(&[core, widgets]);
        let matched = edges.iter().find(|e| e.package_id == "core-lib").unwrap();
        assert!(matched.is_matched());
        let unmatched = edges.iter().find(|e| e.package_id == "external-crate").unwrap();
        assert!(!unmatched.is_matched());
    }
}
