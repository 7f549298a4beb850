//! Connector entity: credentials + endpoint for one external system.

use crate::ids::ConnectorId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    VcsHost,
    PackageRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStatus {
    Unknown,
    Ok,
    Error,
}

crate::simple_display! {
    ConnectorStatus {
        Unknown => "unknown",
        Ok => "ok",
        Error => "error",
    }
}

/// Which wire shape a `PackageRegistry` connector speaks, derived from its
/// base-url pattern rather than stored as a separate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryProtocol {
    /// VCS-host-style package registry (e.g. a GitHub/GitLab package index).
    VcsHostCatalog,
    /// Public open registry, no auth header required.
    PublicOpen,
    /// Private catalog server speaking Basic or Bearer auth.
    PrivateCatalog,
}

impl RegistryProtocol {
    /// Derive the probing protocol from a connector's base URL.
    ///
    /// Hosts recognised as "public open" registries never need an
    /// Authorization header; anything else falls back to the private
    /// catalog shape, which upgrades to Basic/Bearer only when credentials
    /// are actually present on the connector.
    pub fn from_base_url(base_url: &str) -> Self {
        let lower = base_url.to_ascii_lowercase();
        if lower.contains("crates.io") || lower.contains("registry.npmjs.org") || lower.contains("pypi.org") {
            RegistryProtocol::PublicOpen
        } else if lower.contains("pkgs.dev.azure.com")
            || lower.contains("nuget.pkg.github.com")
            || lower.contains("maven.pkg.github.com")
        {
            RegistryProtocol::VcsHostCatalog
        } else {
            RegistryProtocol::PrivateCatalog
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub name: String,
    pub kind: ConnectorKind,
    pub base_url: String,
    #[serde(default)]
    pub user_name: Option<String>,
    /// Stored in cleartext; no vault or at-rest encryption layer.
    #[serde(default)]
    pub token: Option<String>,
    pub status: ConnectorStatus,
    pub active: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Connector {
    pub fn new(name: impl Into<String>, kind: ConnectorKind, base_url: impl Into<String>) -> Self {
        Self {
            id: ConnectorId::new(),
            name: name.into(),
            kind,
            base_url: base_url.into(),
            user_name: None,
            token: None,
            status: ConnectorStatus::Unknown,
            active: true,
            last_error: None,
        }
    }

    pub fn registry_protocol(&self) -> Option<RegistryProtocol> {
        match self.kind {
            ConnectorKind::PackageRegistry => Some(RegistryProtocol::from_base_url(&self.base_url)),
            ConnectorKind::VcsHost => None,
        }
    }

    crate::setters! {
        set { active: bool, status: ConnectorStatus }
        option { user_name: String, token: String, last_error: String }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_derivation_from_base_url() {
        assert_eq!(RegistryProtocol::from_base_url("https://crates.io"), RegistryProtocol::PublicOpen);
        assert_eq!(
            RegistryProtocol::from_base_url("https://pkgs.dev.azure.com/org/_packaging/feed"),
            RegistryProtocol::VcsHostCatalog
        );
        assert_eq!(
            RegistryProtocol::from_base_url("https://registry.internal.example.com"),
            RegistryProtocol::PrivateCatalog
        );
    }
}
