//! Repository entity.

use crate::ids::{ConnectorId, RepositoryId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub connector_id: ConnectorId,
    pub owner: String,
    pub name: String,
    pub visibility: Visibility,
    pub clone_url: String,
}

impl Repository {
    pub fn new(
        connector_id: ConnectorId,
        owner: impl Into<String>,
        name: impl Into<String>,
        clone_url: impl Into<String>,
    ) -> Self {
        Self {
            id: RepositoryId::new(),
            connector_id,
            owner: owner.into(),
            name: name.into(),
            visibility: Visibility::Private,
            clone_url: clone_url.into(),
        }
    }

    /// Unique key per (connector, org, name).
    pub fn identity_key(&self) -> (ConnectorId, String, String) {
        (self.connector_id.clone(), self.owner.clone(), self.name.clone())
    }
}
