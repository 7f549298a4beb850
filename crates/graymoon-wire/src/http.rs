//! DTOs for the Control Service's external REST surface.

use graymoon_core::{RepositoryId, WorkspaceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
}

/// Body of the agent's loopback `POST /notify`, posted by a local VCS hook.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyHookRequest {
    pub repository_id: RepositoryId,
    pub workspace_id: WorkspaceId,
    pub repository_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAcceptedStatus {
    Accepted,
    DroppedDuplicate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncAcceptedResponse {
    pub status: SyncAcceptedStatus,
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncQueueEntry {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub in_flight: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncQueueResponse {
    pub entries: Vec<SyncQueueEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitSyncRequest {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullPushRequest {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBranchRequest {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub branch: String,
    pub from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutBranchRequest {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub branch: String,
}

/// Broadcast over the realtime endpoint whenever a workspace finishes a
/// sync pass (either a single on-demand sync or one push-scheduler level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSyncedEvent {
    pub workspace_id: WorkspaceId,
    pub repository_id: Option<RepositoryId>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

impl ApiErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into() }
    }
}
