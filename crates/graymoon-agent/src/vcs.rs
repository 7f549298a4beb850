//! VCS execution: shells out to the local `git` binary rather than linking
//! a git implementation, the same tradeoff the host-resident adapter makes
//! for its own repository introspection.

use async_trait::async_trait;
use graymoon_core::{GrayMoonError, Result};
use graymoon_wire::GitVersion;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitBranchInfo {
    pub name: String,
    pub is_default: bool,
    pub head_sha: Option<String>,
}

#[async_trait]
pub trait VcsExecutor: Send + Sync {
    async fn clone_repo(&self, clone_url: &str, local_path: &Path, branch: Option<&str>) -> Result<()>;
    async fn fetch(&self, local_path: &Path) -> Result<()>;
    /// Fetch tags only; separate from `fetch` because the notify path wants
    /// tag refs for version calc without re-running a full prune fetch.
    async fn run_fetch_tags(&self, local_path: &Path) -> Result<()>;
    async fn checkout(&self, local_path: &Path, branch: &str) -> Result<()>;
    async fn create_branch(&self, local_path: &Path, branch: &str, from: Option<&str>) -> Result<()>;
    async fn current_branch(&self, local_path: &Path) -> Result<String>;
    async fn default_branch(&self, local_path: &Path) -> Result<String>;
    async fn ahead_behind(&self, local_path: &Path, branch: &str) -> Result<GitVersion>;
    /// Whether `branch` has a configured upstream tracking ref.
    async fn has_upstream(&self, local_path: &Path, branch: &str) -> Result<bool>;
    async fn push(&self, local_path: &Path, branch: &str, force_with_lease: bool) -> Result<()>;
    async fn commit_all(&self, local_path: &Path, message: &str) -> Result<String>;
    async fn list_branches(&self, local_path: &Path) -> Result<Vec<GitBranchInfo>>;
}

pub struct GitCliExecutor;

impl GitCliExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, local_path: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(local_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| GrayMoonError::VcsFailure(format!("failed to spawn git {}: {e}", args.join(" "))))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GrayMoonError::VcsFailure(format!("git {} failed: {stderr}", args.join(" "))));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitCliExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VcsExecutor for GitCliExecutor {
    async fn clone_repo(&self, clone_url: &str, local_path: &Path, branch: Option<&str>) -> Result<()> {
        let mut args = vec!["clone", clone_url, local_path.to_str().unwrap_or_default()];
        if let Some(branch) = branch {
            args.push("--branch");
            args.push(branch);
        }
        let parent = local_path.parent().unwrap_or(local_path);
        let output = Command::new("git")
            .args(&args)
            .current_dir(parent)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| GrayMoonError::VcsFailure(format!("failed to spawn git clone: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GrayMoonError::VcsFailure(format!("git clone failed: {stderr}")));
        }
        Ok(())
    }

    async fn fetch(&self, local_path: &Path) -> Result<()> {
        self.run(local_path, &["fetch", "--prune", "origin"]).await?;
        Ok(())
    }

    async fn run_fetch_tags(&self, local_path: &Path) -> Result<()> {
        self.run(local_path, &["fetch", "--tags", "origin"]).await?;
        Ok(())
    }

    async fn checkout(&self, local_path: &Path, branch: &str) -> Result<()> {
        self.run(local_path, &["checkout", branch]).await?;
        Ok(())
    }

    async fn create_branch(&self, local_path: &Path, branch: &str, from: Option<&str>) -> Result<()> {
        let start_point = from.unwrap_or("HEAD");
        self.run(local_path, &["checkout", "-b", branch, start_point]).await?;
        Ok(())
    }

    async fn current_branch(&self, local_path: &Path) -> Result<String> {
        let branch = self.run(local_path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if branch.is_empty() || branch == "HEAD" {
            return Err(GrayMoonError::VcsFailure("repository is in detached HEAD state".to_string()));
        }
        Ok(branch)
    }

    async fn default_branch(&self, local_path: &Path) -> Result<String> {
        let symref = self.run(local_path, &["symbolic-ref", "refs/remotes/origin/HEAD"]).await?;
        Ok(symref.trim_start_matches("refs/remotes/origin/").to_string())
    }

    async fn ahead_behind(&self, local_path: &Path, branch: &str) -> Result<GitVersion> {
        self.fetch(local_path).await?;
        let upstream = format!("origin/{branch}");
        let counts = self.run(local_path, &["rev-list", "--left-right", "--count", &format!("{branch}...{upstream}")]).await?;
        let mut parts = counts.split_whitespace();
        let ahead: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let behind: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let head_sha = self.run(local_path, &["rev-parse", branch]).await?;
        Ok(GitVersion { branch: branch.to_string(), head_sha, ahead, behind })
    }

    async fn has_upstream(&self, local_path: &Path, branch: &str) -> Result<bool> {
        let upstream_ref = format!("{branch}@{{upstream}}");
        Ok(self.run(local_path, &["rev-parse", "--abbrev-ref", &upstream_ref]).await.is_ok())
    }

    async fn push(&self, local_path: &Path, branch: &str, force_with_lease: bool) -> Result<()> {
        let mut args = vec!["push", "origin", branch];
        if force_with_lease {
            args.insert(1, "--force-with-lease");
        }
        let result = self.run(local_path, &args).await;
        result.map(|_| ()).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("non-fast-forward") || msg.contains("fetch first") {
                GrayMoonError::MergeConflict
            } else {
                e
            }
        })
    }

    async fn commit_all(&self, local_path: &Path, message: &str) -> Result<String> {
        self.run(local_path, &["add", "-A"]).await?;
        self.run(local_path, &["commit", "-m", message]).await?;
        self.run(local_path, &["rev-parse", "HEAD"]).await
    }

    async fn list_branches(&self, local_path: &Path) -> Result<Vec<GitBranchInfo>> {
        self.fetch(local_path).await?;
        let default = self.default_branch(local_path).await.ok();
        let output = self
            .run(local_path, &["for-each-ref", "--format=%(refname:short) %(objectname)", "refs/remotes/origin"])
            .await?;
        let branches = output
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let full_name = parts.next()?;
                let sha = parts.next().map(str::to_string);
                let name = full_name.strip_prefix("origin/")?;
                if name == "HEAD" {
                    return None;
                }
                Some(GitBranchInfo {
                    is_default: Some(name) == default.as_deref(),
                    name: name.to_string(),
                    head_sha: sha,
                })
            })
            .collect();
        Ok(branches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_on_nonexistent_repo_surfaces_vcs_failure() {
        let executor = GitCliExecutor::new();
        let result = executor.current_branch(Path::new("/nonexistent/path/does/not/exist")).await;
        assert!(matches!(result, Err(GrayMoonError::VcsFailure(_))));
    }
}
