//! Control Service HTTP surface: sync trigger/status, agent-bridge
//! facades for commit/push/branch operations, and a realtime broadcast
//! stream for UI refresh. Grounded on the agent's `hook_listener` router
//! shape (axum `State`, thin handlers, typed DTOs).

mod dto;

use crate::agent_bridge::{AgentBridge, AgentCommandResponse};
use crate::broadcast::Broadcast;
use crate::push_scheduler::{PushProgress, PushScheduler};
use crate::store::Store;
use crate::sync_queue::{EnqueueOutcome, SyncQueue, SyncRequest, SyncTrigger};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dto::{
    CheckoutBranchRequestBody, CommandOutcomeBody, CommitSyncRequestBody, CreateBranchRequestBody, PullPushRequestBody,
    RepoLocalPathBody, SyncQueueResponse, SyncRequestBody,
};
use futures_util::stream::{self, Stream};
use graymoon_core::WorkspaceId;
use graymoon_wire::RequestCommand;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn Store>,
    pub bridge: Arc<AgentBridge>,
    pub sync_queue: Arc<SyncQueue>,
    pub broadcast: Arc<Broadcast>,
    pub push_scheduler: Arc<PushScheduler>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/sync", post(handle_sync))
        .route("/api/sync/queue", get(handle_sync_queue))
        .route("/api/commitsync", post(handle_commit_sync))
        .route("/api/pullpush", post(handle_pull_push))
        .route("/api/branches/checkout", post(handle_checkout_branch))
        .route("/api/branches/create", post(handle_create_branch))
        .route("/api/branches/sync-default", post(handle_sync_default_branch))
        .route("/api/branches/refresh", post(handle_refresh_branches))
        .route("/api/workspaces/:workspace_id/push", post(handle_push_workspace))
        .route("/api/workspaces/:workspace_id/events", get(handle_workspace_events))
        .with_state(state)
}

/// Fires the push in the background; progress and completion surface
/// through the workspace's broadcast stream, not the HTTP response.
async fn handle_push_workspace(State(state): State<ApiState>, Path(workspace_id): Path<WorkspaceId>) -> StatusCode {
    tokio::spawn(async move {
        let cancel = tokio_util::sync::CancellationToken::new();
        let result = state
            .push_scheduler
            .push_workspace(&workspace_id, None, |progress| log_push_progress(&workspace_id, progress), &cancel)
            .await;
        if let Err(err) = result {
            tracing::warn!(workspace_id = %workspace_id.as_str(), error = %err, "push scheduler setup failed");
        }
        state.broadcast.publish(&workspace_id);
    });
    StatusCode::ACCEPTED
}

fn log_push_progress(workspace_id: &WorkspaceId, progress: PushProgress) {
    tracing::info!(workspace_id = %workspace_id.as_str(), ?progress, "push progress");
}

async fn handle_sync(State(state): State<ApiState>, Json(body): Json<SyncRequestBody>) -> StatusCode {
    if state.store.get_link(&body.workspace_id, &body.repository_id).await.is_err() {
        return StatusCode::NOT_FOUND;
    }

    let request = SyncRequest { workspace_id: body.workspace_id, repository_id: body.repository_id, trigger: SyncTrigger::Manual };
    match state.sync_queue.enqueue(request) {
        EnqueueOutcome::Accepted | EnqueueOutcome::DroppedDuplicate => StatusCode::ACCEPTED,
        EnqueueOutcome::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn handle_sync_queue(State(state): State<ApiState>) -> Json<SyncQueueResponse> {
    let depth = state.sync_queue.queue_depth();
    Json(SyncQueueResponse { queue_depth: depth, message: format!("{depth} repositories queued for sync") })
}

async fn handle_commit_sync(State(state): State<ApiState>, Json(body): Json<CommitSyncRequestBody>) -> impl IntoResponse {
    let response = state
        .bridge
        .send_command(RequestCommand::CommitSyncRepository {
            repository_id: body.repository_id,
            local_path: body.local_path,
            message: body.message,
        })
        .await;
    outcome_response(response)
}

async fn handle_pull_push(State(state): State<ApiState>, Json(body): Json<PullPushRequestBody>) -> impl IntoResponse {
    let response = state
        .bridge
        .send_command(RequestCommand::PushRepository {
            repository_id: body.repository_id,
            local_path: body.local_path,
            branch: body.branch,
            force_with_lease: false,
        })
        .await;
    outcome_response(response)
}

async fn handle_checkout_branch(State(state): State<ApiState>, Json(body): Json<CheckoutBranchRequestBody>) -> impl IntoResponse {
    let response = state
        .bridge
        .send_command(RequestCommand::CheckoutBranch {
            repository_id: body.repository_id,
            local_path: body.local_path,
            branch: body.branch,
        })
        .await;
    outcome_response(response)
}

async fn handle_create_branch(State(state): State<ApiState>, Json(body): Json<CreateBranchRequestBody>) -> impl IntoResponse {
    let response = state
        .bridge
        .send_command(RequestCommand::CreateBranch {
            repository_id: body.repository_id,
            local_path: body.local_path,
            branch: body.branch,
            from: body.from,
        })
        .await;
    outcome_response(response)
}

async fn handle_sync_default_branch(State(state): State<ApiState>, Json(body): Json<RepoLocalPathBody>) -> impl IntoResponse {
    let response = state
        .bridge
        .send_command(RequestCommand::SyncToDefaultBranch { repository_id: body.repository_id, local_path: body.local_path })
        .await;
    outcome_response(response)
}

async fn handle_refresh_branches(State(state): State<ApiState>, Json(body): Json<RepoLocalPathBody>) -> impl IntoResponse {
    let response = state
        .bridge
        .send_command(RequestCommand::RefreshBranches { repository_id: body.repository_id, local_path: body.local_path })
        .await;
    outcome_response(response)
}

fn outcome_response(response: AgentCommandResponse) -> (StatusCode, Json<CommandOutcomeBody>) {
    let status = if response.success { StatusCode::OK } else { StatusCode::BAD_GATEWAY };
    (status, Json(CommandOutcomeBody { success: response.success, error: response.error }))
}

async fn handle_workspace_events(
    State(state): State<ApiState>,
    Path(workspace_id): Path<WorkspaceId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broadcast.subscribe(workspace_id);
    let events = stream::unfold(subscription, |mut sub| async move {
        sub.recv().await.map(|workspace_id| (Ok(Event::default().event("workspace_synced").data(workspace_id.to_string())), sub))
    });
    Sse::new(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_hub::RpcHub;
    use crate::store::in_memory::InMemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use graymoon_core::{RepositoryId, WorkspaceRepositoryLink};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn test_state(store: Arc<dyn Store>) -> ApiState {
        let (hub, _notifies) = RpcHub::new();
        let bridge = Arc::new(AgentBridge::new(hub));
        let broadcast = Arc::new(Broadcast::new());
        let sync_queue = SyncQueue::spawn(store.clone(), bridge.clone(), broadcast.clone(), 1, CancellationToken::new());
        let push_scheduler = Arc::new(PushScheduler::new(store.clone(), bridge.clone(), broadcast.clone()));
        ApiState { store, bridge, sync_queue, broadcast, push_scheduler }
    }

    #[tokio::test]
    async fn sync_unknown_link_returns_not_found() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let app = router(test_state(store));

        let body = serde_json::json!({ "repositoryId": RepositoryId::new(), "workspaceId": WorkspaceId::new() });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sync")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_known_link_is_accepted() {
        let store = InMemoryStore::new();
        let workspace_id = WorkspaceId::new();
        let repository_id = RepositoryId::new();
        store.upsert_link(WorkspaceRepositoryLink::new(workspace_id.clone(), repository_id.clone())).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        let app = router(test_state(store));

        let body = serde_json::json!({ "repositoryId": repository_id, "workspaceId": workspace_id });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sync")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn queue_depth_reports_zero_when_idle() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let app = router(test_state(store));

        let response = app.oneshot(Request::builder().uri("/api/sync/queue").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn commit_sync_without_agent_reports_failure() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let app = router(test_state(store));

        let body = serde_json::json!({ "repositoryId": RepositoryId::new(), "localPath": "/w/r", "message": "wip" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/commitsync")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
