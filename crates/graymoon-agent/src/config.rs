//! Configuration for the host agent, loaded from TOML with environment and
//! CLI overrides layered on top (CLI wins, then env, then file, then
//! built-in default).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_listen_port() -> u16 {
    9191
}

fn default_max_concurrent_commands() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// `host:port` of the Control Service's RPC hub, used for the outbound
    /// persistent connection and for reporting this agent's version on
    /// connect.
    pub app_hub_url: String,

    /// Loopback port the notify hook listener binds to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Size of the agent's worker pool, and the basis for the job queue's
    /// capacity (`2 * max_concurrent_commands`).
    #[serde(default = "default_max_concurrent_commands")]
    pub max_concurrent_commands: usize,

    /// Root directory under which workspace clones are laid out.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
}

fn default_workspace_root() -> String {
    "/var/lib/graymoon/workspaces".to_string()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            app_hub_url: String::new(),
            listen_port: default_listen_port(),
            max_concurrent_commands: default_max_concurrent_commands(),
            workspace_root: default_workspace_root(),
        }
    }
}

impl AgentSettings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut settings: AgentSettings =
            toml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GRAYMOON_APP_HUB_URL") {
            self.app_hub_url = url;
        }
        if let Ok(port) = std::env::var("GRAYMOON_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                self.listen_port = port;
            }
        }
        if let Ok(n) = std::env::var("GRAYMOON_MAX_CONCURRENT_COMMANDS") {
            if let Ok(n) = n.parse() {
                self.max_concurrent_commands = n;
            }
        }
    }

    pub fn queue_capacity(&self) -> usize {
        (self.max_concurrent_commands * 2).max(64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_hub_url.is_empty() {
            bail!("app_hub_url must be set");
        }
        if self.max_concurrent_commands == 0 {
            bail!("max_concurrent_commands must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_capacity_is_double_workers_with_floor() {
        let mut settings = AgentSettings { max_concurrent_commands: 8, ..Default::default() };
        assert_eq!(settings.queue_capacity(), 64);
        settings.max_concurrent_commands = 40;
        assert_eq!(settings.queue_capacity(), 80);
    }

    #[test]
    fn validate_rejects_missing_app_hub_url() {
        let settings = AgentSettings::default();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let toml = r#"app_hub_url = "https://control.example.com""#;
        let settings: AgentSettings = toml::from_str(toml).unwrap();
        assert_eq!(settings.listen_port, 9191);
        assert_eq!(settings.max_concurrent_commands, 8);
    }
}
