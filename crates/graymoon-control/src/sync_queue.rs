//! Background per-repo sync processing with in-flight de-duplication. A
//! repo already queued or being synced is not queued again; the duplicate
//! request is simply dropped and reported as such to its caller.

use crate::agent_bridge::AgentBridge;
use crate::broadcast::Broadcast;
use crate::store::Store;
use graymoon_core::{LinkSyncStatus, RepositoryId, WorkspaceId};
use graymoon_wire::{RequestCommand, ResponseCommand};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Hook,
    Manual,
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub trigger: SyncTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    DroppedDuplicate,
    /// The worker channel is closed (shutdown in progress); distinct from
    /// a duplicate so HTTP callers can tell 202 apart from 503.
    Unavailable,
}

type Key = (WorkspaceId, RepositoryId);

pub struct SyncQueue {
    sender: mpsc::UnboundedSender<SyncRequest>,
    in_flight: Arc<Mutex<HashSet<Key>>>,
    queue_depth: Arc<AtomicUsize>,
}

impl SyncQueue {
    pub fn spawn(
        store: Arc<dyn Store>,
        bridge: Arc<AgentBridge>,
        broadcast: Arc<Broadcast>,
        concurrency: usize,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            sender,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            queue_depth: Arc::new(AtomicUsize::new(0)),
        });

        let receiver = Arc::new(AsyncMutex::new(receiver));
        for worker_id in 0..concurrency.max(1) {
            let receiver = receiver.clone();
            let store = store.clone();
            let bridge = bridge.clone();
            let broadcast = broadcast.clone();
            let in_flight = queue.in_flight.clone();
            let queue_depth = queue.queue_depth.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, receiver, store, bridge, broadcast, in_flight, queue_depth, shutdown).await
            });
        }

        queue
    }

    pub fn enqueue(&self, request: SyncRequest) -> EnqueueOutcome {
        let key = (request.workspace_id.clone(), request.repository_id.clone());
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(key.clone()) {
            return EnqueueOutcome::DroppedDuplicate;
        }
        drop(in_flight);

        self.queue_depth.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(request).is_err() {
            self.queue_depth.fetch_sub(1, Ordering::SeqCst);
            self.in_flight.lock().remove(&key);
            return EnqueueOutcome::Unavailable;
        }
        EnqueueOutcome::Accepted
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::SeqCst)
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<SyncRequest>>>,
    store: Arc<dyn Store>,
    bridge: Arc<AgentBridge>,
    broadcast: Arc<Broadcast>,
    in_flight: Arc<Mutex<HashSet<Key>>>,
    queue_depth: Arc<AtomicUsize>,
    shutdown: CancellationToken,
) {
    loop {
        let request = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                request = receiver.recv() => request,
                _ = shutdown.cancelled() => None,
            }
        };
        let Some(request) = request else {
            info!(worker_id, "sync queue worker exiting");
            return;
        };

        queue_depth.fetch_sub(1, Ordering::SeqCst);
        process(&request, &store, &bridge, &broadcast, &shutdown).await;
        in_flight.lock().remove(&(request.workspace_id.clone(), request.repository_id.clone()));
    }
}

async fn process(
    request: &SyncRequest,
    store: &Arc<dyn Store>,
    bridge: &Arc<AgentBridge>,
    broadcast: &Arc<Broadcast>,
    cancel: &CancellationToken,
) {
    let link = match store.get_link(&request.workspace_id, &request.repository_id).await {
        Ok(link) => link,
        Err(err) => {
            warn!(error = %err, "sync queue: repo not a member of workspace");
            return;
        }
    };

    let response = if link.local_path.is_none() {
        let repository = match store.get_repository(&request.repository_id).await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "sync queue: repository missing");
                return;
            }
        };
        bridge
            .send_command_with_cancel(
                RequestCommand::SyncRepository {
                    workspace_id: request.workspace_id.clone(),
                    repository_id: request.repository_id.clone(),
                    clone_url: repository.clone_url,
                    local_path: default_local_path(&request.workspace_id, &request.repository_id),
                    branch: None,
                },
                cancel,
            )
            .await
    } else {
        bridge
            .send_command_with_cancel(
                RequestCommand::RefreshRepositoryVersion {
                    repository_id: request.repository_id.clone(),
                    local_path: link.local_path.clone().unwrap_or_default(),
                    branch: link.current_branch.clone().unwrap_or_else(|| "main".to_string()),
                },
                cancel,
            )
            .await
    };

    let mut updated = link;
    if response.success {
        match response.data {
            Some(ResponseCommand::SyncRepository { link: new_link, projects, dependencies, .. }) => {
                if let Err(err) = store.replace_projects(&new_link.id, projects, dependencies).await {
                    warn!(error = %err, "sync queue: failed to persist projects");
                }
                updated = new_link;
            }
            Some(ResponseCommand::RepositoryVersion { version }) => {
                updated.current_branch = Some(version.branch);
                updated.version = Some(version.head_sha);
                updated.ahead = version.ahead;
                updated.behind = version.behind;
                updated.status = LinkSyncStatus::InSync;
                updated.last_error = None;
            }
            _ => {}
        }
    } else {
        updated.status = LinkSyncStatus::Error;
        updated.last_error = response.error;
    }

    if let Err(err) = store.upsert_link(updated).await {
        warn!(error = %err, "sync queue: failed to persist link");
    }

    if let Err(err) = crate::dependency_solver::solve_and_persist(store.as_ref(), &request.workspace_id).await {
        warn!(error = %err, "sync queue: dependency solve failed");
    }

    broadcast.publish(&request.workspace_id);
}

fn default_local_path(workspace_id: &WorkspaceId, repository_id: &RepositoryId) -> String {
    format!("/var/lib/graymoon/workspaces/{}/{}", workspace_id.as_str(), repository_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_hub::RpcHub;
    use crate::store::in_memory::InMemoryStore;
    use std::time::Duration;

    fn disconnected_bridge() -> Arc<AgentBridge> {
        let (hub, _notifies) = RpcHub::new();
        Arc::new(AgentBridge::new(hub))
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_dropped_while_in_flight() {
        let store = Arc::new(InMemoryStore::new());
        let bridge = disconnected_bridge();
        let broadcast = Arc::new(Broadcast::new());
        let queue = SyncQueue::spawn(store.clone(), bridge, broadcast, 1, CancellationToken::new());

        let workspace_id = WorkspaceId::new();
        let repository_id = RepositoryId::new();
        store
            .upsert_link(graymoon_core::WorkspaceRepositoryLink::new(workspace_id.clone(), repository_id.clone()))
            .await
            .unwrap();

        let request = SyncRequest { workspace_id, repository_id, trigger: SyncTrigger::Hook };
        assert_eq!(queue.enqueue(request.clone()), EnqueueOutcome::Accepted);
        assert_eq!(queue.enqueue(request), EnqueueOutcome::DroppedDuplicate);
    }

    #[tokio::test]
    async fn failed_sync_clears_in_flight_marker_for_retry() {
        let store = Arc::new(InMemoryStore::new());
        let bridge = disconnected_bridge();
        let broadcast = Arc::new(Broadcast::new());
        let queue = SyncQueue::spawn(store.clone(), bridge, broadcast, 1, CancellationToken::new());

        let workspace_id = WorkspaceId::new();
        let repository_id = RepositoryId::new();
        store
            .upsert_link(graymoon_core::WorkspaceRepositoryLink::new(workspace_id.clone(), repository_id.clone()))
            .await
            .unwrap();

        let request =
            SyncRequest { workspace_id: workspace_id.clone(), repository_id: repository_id.clone(), trigger: SyncTrigger::Manual };
        queue.enqueue(request.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(queue.enqueue(request), EnqueueOutcome::Accepted);
    }
}
