//! Wire shapes for the Control HTTP surface. `args`/response bodies use
//! camelCase per the documented RPC framing convention, carried over here
//! for the externally-facing UI/API too.

use graymoon_core::{RepositoryId, WorkspaceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestBody {
    pub repository_id: RepositoryId,
    pub workspace_id: WorkspaceId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueResponse {
    pub queue_depth: usize,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSyncRequestBody {
    pub repository_id: RepositoryId,
    pub local_path: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullPushRequestBody {
    pub repository_id: RepositoryId,
    pub local_path: String,
    pub branch: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBranchRequestBody {
    pub repository_id: RepositoryId,
    pub local_path: String,
    pub branch: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoLocalPathBody {
    pub repository_id: RepositoryId,
    pub local_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchRequestBody {
    pub repository_id: RepositoryId,
    pub local_path: String,
    pub branch: String,
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcomeBody {
    pub success: bool,
    pub error: Option<String>,
}
