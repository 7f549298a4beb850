//! Glue between the project-file parser and the `RefreshRepositoryProjects`
//! / `SyncRepositoryDependencies` commands.

use crate::project_parser::{default_parsers, discover_manifests, link_dependencies, ParsedProject};
use graymoon_core::{GrayMoonError, LinkId, ProjectDependency, Result, WorkspaceProject};
use graymoon_wire::DependencySyncEntry;
use std::path::Path;

/// Scan `local_path` for manifests and build the full project/dependency
/// graph for that one repository checkout.
pub fn refresh(local_path: &Path) -> (Vec<WorkspaceProject>, Vec<ProjectDependency>) {
    let parsers = default_parsers();
    let link_id = LinkId::new();
    let manifests = discover_manifests(local_path, &parsers);

    let parsed: Vec<ParsedProject> = manifests
        .iter()
        .filter_map(|manifest_path| {
            let contents = std::fs::read_to_string(manifest_path).ok()?;
            parsers.iter().find_map(|parser| {
                let name = manifest_path.file_name()?.to_str()?;
                if parser.manifest_file_names().contains(&name) {
                    parser.parse(link_id.clone(), manifest_path, &contents)
                } else {
                    None
                }
            })
        })
        .collect();

    let dependencies = link_dependencies(&parsed);
    let projects = parsed.into_iter().map(|p| p.project).collect();
    (projects, dependencies)
}

/// Rewrite each dependency's version requirement in its manifest to the
/// resolved version pinned by the push scheduler, then leave the working
/// tree dirty for the caller to commit. Returns the number of requirements
/// actually changed; a requirement already at its resolved version is not
/// counted, so calling this twice with the same `entries` reports `0` the
/// second time.
pub fn sync_dependencies(local_path: &Path, entries: &[DependencySyncEntry]) -> Result<u32> {
    let parsers = default_parsers();
    let mut updated_count = 0u32;
    for manifest_path in discover_manifests(local_path, &parsers) {
        let Some(name) = manifest_path.file_name().and_then(|n| n.to_str()) else { continue };
        if name == "Cargo.toml" {
            updated_count += rewrite_cargo_toml(&manifest_path, entries)?;
        } else if name == "package.json" {
            updated_count += rewrite_package_json(&manifest_path, entries)?;
        }
    }
    Ok(updated_count)
}

fn rewrite_cargo_toml(manifest_path: &Path, entries: &[DependencySyncEntry]) -> Result<u32> {
    let contents = std::fs::read_to_string(manifest_path)
        .map_err(|e| GrayMoonError::InternalError(format!("reading {}: {e}", manifest_path.display())))?;
    let mut doc: toml::Value =
        contents.parse().map_err(|e| GrayMoonError::InternalError(format!("parsing {}: {e}", manifest_path.display())))?;

    let mut updated_count = 0u32;
    for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
        if let Some(table) = doc.get_mut(section).and_then(|v| v.as_table_mut()) {
            for entry in entries {
                if let Some(existing) = table.get_mut(&entry.package_id) {
                    match existing {
                        toml::Value::String(s) => {
                            if *s != entry.resolved_version {
                                *s = entry.resolved_version.clone();
                                updated_count += 1;
                            }
                        }
                        toml::Value::Table(t) => {
                            let current = t.get("version").and_then(|v| v.as_str());
                            if current != Some(entry.resolved_version.as_str()) {
                                t.insert("version".to_string(), toml::Value::String(entry.resolved_version.clone()));
                                updated_count += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    if updated_count > 0 {
        let rendered = toml::to_string_pretty(&doc)
            .map_err(|e| GrayMoonError::InternalError(format!("serializing {}: {e}", manifest_path.display())))?;
        std::fs::write(manifest_path, rendered)
            .map_err(|e| GrayMoonError::InternalError(format!("writing {}: {e}", manifest_path.display())))?;
    }
    Ok(updated_count)
}

fn rewrite_package_json(manifest_path: &Path, entries: &[DependencySyncEntry]) -> Result<u32> {
    let contents = std::fs::read_to_string(manifest_path)
        .map_err(|e| GrayMoonError::InternalError(format!("reading {}: {e}", manifest_path.display())))?;
    let mut doc: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| GrayMoonError::InternalError(format!("parsing {}: {e}", manifest_path.display())))?;

    let mut updated_count = 0u32;
    for section in ["dependencies", "devDependencies"] {
        if let Some(obj) = doc.get_mut(section).and_then(|v| v.as_object_mut()) {
            for entry in entries {
                if let Some(current) = obj.get(&entry.package_id).and_then(|v| v.as_str()) {
                    if current != entry.resolved_version {
                        obj.insert(entry.package_id.clone(), serde_json::Value::String(entry.resolved_version.clone()));
                        updated_count += 1;
                    }
                }
            }
        }
    }

    if updated_count > 0 {
        let rendered = serde_json::to_string_pretty(&doc)
            .map_err(|e| GrayMoonError::InternalError(format!("serializing {}: {e}", manifest_path.display())))?;
        std::fs::write(manifest_path, rendered)
            .map_err(|e| GrayMoonError::InternalError(format!("writing {}: {e}", manifest_path.display())))?;
    }
    Ok(updated_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn refresh_discovers_cargo_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n").unwrap();

        let (projects, dependencies) = refresh(dir.path());
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].package_id, "demo");
        assert!(dependencies.is_empty());
    }

    #[test]
    fn sync_dependencies_rewrites_matching_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n\n[dependencies]\ncore-lib = \"0.1\"\n",
        )
        .unwrap();

        sync_dependencies(
            dir.path(),
            &[DependencySyncEntry { package_id: "core-lib".to_string(), resolved_version: "0.2.0".to_string() }],
        )
        .unwrap();

        let rewritten = fs::read_to_string(dir.path().join("Cargo.toml")).unwrap();
        assert!(rewritten.contains("0.2.0"));
    }

    #[test]
    fn sync_dependencies_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n\n[dependencies]\ncore-lib = \"0.1\"\n",
        )
        .unwrap();

        let entries = [DependencySyncEntry { package_id: "core-lib".to_string(), resolved_version: "0.2.0".to_string() }];

        let first = sync_dependencies(dir.path(), &entries).unwrap();
        assert_eq!(first, 1);

        let second = sync_dependencies(dir.path(), &entries).unwrap();
        assert_eq!(second, 0);
    }
}
