//! Configuration for the Control Service, loaded from TOML with environment
//! overrides layered on top, mirroring the agent's config loading shape.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_rpc_listen_port() -> u16 {
    9192
}

fn default_http_listen_port() -> u16 {
    8080
}

fn default_max_concurrent_git_operations() -> usize {
    8
}

fn default_push_wait_timeout_minutes_per_dependency() -> f64 {
    1.0
}

fn default_sync_max_concurrency() -> usize {
    8
}

fn default_enable_sync_deduplication() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    #[serde(default = "default_max_concurrent_git_operations")]
    pub max_concurrent_git_operations: usize,

    #[serde(default = "default_push_wait_timeout_minutes_per_dependency")]
    pub push_wait_dependency_timeout_minutes_per_dependency: f64,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            max_concurrent_git_operations: default_max_concurrent_git_operations(),
            push_wait_dependency_timeout_minutes_per_dependency: default_push_wait_timeout_minutes_per_dependency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_sync_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_enable_sync_deduplication")]
    pub enable_deduplication: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { max_concurrency: default_sync_max_concurrency(), enable_deduplication: default_enable_sync_deduplication() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Address the RPC hub binds to for the agent's persistent connection.
    #[serde(default = "default_rpc_listen_port")]
    pub rpc_listen_port: u16,

    /// Address the HTTP API (UI + hooks) binds to.
    #[serde(default = "default_http_listen_port")]
    pub http_listen_port: u16,

    /// Placeholder for a real database; the in-memory store needs nothing
    /// but the field stays so swapping in a transactional store is a
    /// config change, not a recompile.
    #[serde(default)]
    pub store_connection_string: Option<String>,

    #[serde(default)]
    pub workspace: WorkspaceSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            rpc_listen_port: default_rpc_listen_port(),
            http_listen_port: default_http_listen_port(),
            store_connection_string: None,
            workspace: WorkspaceSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl ControlSettings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut settings: ControlSettings =
            toml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("GRAYMOON_RPC_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                self.rpc_listen_port = port;
            }
        }
        if let Ok(port) = std::env::var("GRAYMOON_HTTP_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                self.http_listen_port = port;
            }
        }
        if let Ok(conn) = std::env::var("GRAYMOON_STORE_CONNECTION_STRING") {
            self.store_connection_string = Some(conn);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_listen_port == self.http_listen_port {
            bail!("rpc_listen_port and http_listen_port must differ");
        }
        if self.workspace.max_concurrent_git_operations == 0 {
            bail!("workspace.max_concurrent_git_operations must be greater than 0");
        }
        if self.sync.max_concurrency == 0 {
            bail!("sync.max_concurrency must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ControlSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_colliding_ports() {
        let settings = ControlSettings { http_listen_port: 9192, rpc_listen_port: 9192, ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parses_empty_toml_with_defaults() {
        let settings: ControlSettings = toml::from_str("").unwrap();
        assert_eq!(settings.rpc_listen_port, 9192);
        assert!(settings.sync.enable_deduplication);
    }
}
