//! Probes `PackageRegistry` connectors for package/version existence. Used
//! by the push scheduler to decide whether a synchronised push is possible
//! and, during the wait phase, whether a dependency has landed yet.
//!
//! Grounded on the shipper's registry client (blocking reqwest there;
//! async here since Control runs entirely under tokio).

use graymoon_core::Connector;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::warn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

pub struct RegistryProber {
    client: Client,
}

impl Default for RegistryProber {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryProber {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .expect("reqwest client with only timeout options never fails to build");
        Self { client }
    }

    /// Never throws: any transport failure, timeout, or non-2xx response
    /// is treated as "does not exist" and logged. A 404 maps to an empty
    /// version list in `fetch_index`, so existence is the list being
    /// non-empty, not the request merely succeeding.
    pub async fn package_exists(&self, connector: &Connector, package_id: &str) -> bool {
        match self.fetch_index(connector, package_id).await {
            Ok(versions) => !versions.is_empty(),
            Err(err) => {
                warn!(connector = %connector.name, package_id, error = %err, "package index probe failed");
                false
            }
        }
    }

    pub async fn package_version_exists(&self, connector: &Connector, package_id: &str, version: &str) -> bool {
        match self.fetch_index(connector, package_id).await {
            Ok(versions) => versions.iter().any(|v| v == version),
            Err(err) => {
                warn!(connector = %connector.name, package_id, version, error = %err, "package version probe failed");
                false
            }
        }
    }

    async fn fetch_index(&self, connector: &Connector, package_id: &str) -> anyhow::Result<Vec<String>> {
        let protocol = connector
            .registry_protocol()
            .ok_or_else(|| anyhow::anyhow!("connector {} is not a package registry", connector.name))?;

        let url = match protocol {
            graymoon_core::RegistryProtocol::VcsHostCatalog | graymoon_core::RegistryProtocol::PrivateCatalog => {
                format!("{}/packages/{}", connector.base_url.trim_end_matches('/'), package_id)
            }
            graymoon_core::RegistryProtocol::PublicOpen => {
                format!("{}/{}", connector.base_url.trim_end_matches('/'), package_id)
            }
        };

        let mut request = self.client.get(&url);
        request = match protocol {
            graymoon_core::RegistryProtocol::PublicOpen => request,
            graymoon_core::RegistryProtocol::VcsHostCatalog | graymoon_core::RegistryProtocol::PrivateCatalog => {
                match (&connector.user_name, &connector.token) {
                    (Some(user), Some(token)) => request.basic_auth(user, Some(token)),
                    (_, Some(token)) => request.bearer_auth(token),
                    _ => request,
                }
            }
        };

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            anyhow::bail!("registry returned {}", response.status());
        }

        let body: PackageIndex = response.json().await?;
        Ok(body.versions)
    }
}

#[derive(serde::Deserialize)]
struct PackageIndex {
    #[serde(default)]
    versions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use graymoon_core::{ConnectorKind, ConnectorStatus};

    fn unreachable_connector() -> Connector {
        Connector {
            id: graymoon_core::ConnectorId::new(),
            name: "unreachable".to_string(),
            kind: ConnectorKind::PackageRegistry,
            base_url: "http://127.0.0.1:1".to_string(),
            user_name: None,
            token: None,
            status: ConnectorStatus::Unknown,
            active: true,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn unreachable_connector_reports_false_not_error() {
        let prober = RegistryProber::new();
        let connector = unreachable_connector();
        assert!(!prober.package_exists(&connector, "left-pad").await);
        assert!(!prober.package_version_exists(&connector, "left-pad", "1.0.0").await);
    }
}
