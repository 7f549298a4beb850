//! Loopback HTTP endpoint serving `POST /notify` for local VCS hooks.
//! Bound to `127.0.0.1` only: it carries nothing but ids, so there is no
//! authentication to get wrong.

use crate::queue::JobQueueHandle;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use graymoon_core::{JobEnvelope, NotifyPayload};
use graymoon_wire::NotifyHookRequest;
use serde::Serialize;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Clone)]
struct HookState {
    queue: JobQueueHandle,
    shutdown: CancellationToken,
}

#[derive(Serialize)]
struct QueueDepthResponse {
    queue_depth: usize,
}

pub fn router(queue: JobQueueHandle, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/notify", post(handle_notify))
        .route("/queue", get(handle_queue_depth))
        .with_state(HookState { queue, shutdown })
}

async fn handle_queue_depth(State(state): State<HookState>) -> Json<QueueDepthResponse> {
    Json(QueueDepthResponse { queue_depth: state.queue.depth() })
}

pub async fn serve(listen_port: u16, queue: JobQueueHandle, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], listen_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = router(queue, shutdown.clone());
    axum::serve(listener, app).with_graceful_shutdown(async move { shutdown.cancelled().await }).await
}

async fn handle_notify(State(state): State<HookState>, Json(body): Json<NotifyHookRequest>) -> StatusCode {
    if state.shutdown.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let payload = NotifyPayload {
        repository_id: body.repository_id,
        workspace_id: body.workspace_id,
        repository_path: body.repository_path,
    };
    let envelope = JobEnvelope::notify(payload);

    match state.queue.push(envelope).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            warn!("hook listener: job queue closed, rejecting notify");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::job_queue;
    use axum::body::Body;
    use axum::http::Request;
    use graymoon_core::{RepositoryId, WorkspaceId};
    use tower::ServiceExt;

    #[tokio::test]
    async fn valid_body_enqueues_and_returns_accepted() {
        let (queue, mut rx) = job_queue(4);
        let app = router(queue, CancellationToken::new());

        let body = serde_json::json!({
            "repository_id": RepositoryId::new(),
            "workspace_id": WorkspaceId::new(),
            "repository_path": "/w/repoA",
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/notify")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(rx.pop().await.is_some());
    }

    #[tokio::test]
    async fn malformed_body_returns_bad_request() {
        let (queue, _rx) = job_queue(4);
        let app = router(queue, CancellationToken::new());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/notify")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn queue_depth_reflects_pending_envelopes() {
        let (queue, mut rx) = job_queue(4);
        let app = router(queue.clone(), CancellationToken::new());

        let body = serde_json::json!({
            "repository_id": RepositoryId::new(),
            "workspace_id": WorkspaceId::new(),
            "repository_path": "/w/repoA",
        });
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/notify")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(queue.depth(), 1);
        rx.pop().await.unwrap();
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn shutting_down_returns_service_unavailable() {
        let (queue, _rx) = job_queue(4);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let app = router(queue, shutdown);

        let body = serde_json::json!({
            "repository_id": RepositoryId::new(),
            "workspace_id": WorkspaceId::new(),
            "repository_path": "/w/repoA",
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/notify")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
