//! Workspace-scoped fan-out for `WorkspaceSynced` events. Subscribers carry
//! no event payload beyond the workspace id; they're expected to re-read
//! state from the Store on each wakeup. Slow subscribers lose the newest
//! event rather than block the publisher or evict older ones still queued.

use graymoon_core::WorkspaceId;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

const SUBSCRIBER_BUFFER: usize = 16;

#[derive(Default)]
pub struct Broadcast {
    subscribers: Mutex<HashMap<WorkspaceId, Vec<mpsc::Sender<WorkspaceId>>>>,
}

pub struct Subscription {
    pub workspace_id: WorkspaceId,
    receiver: mpsc::Receiver<WorkspaceId>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<WorkspaceId> {
        self.receiver.recv().await
    }
}

impl Broadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, workspace_id: WorkspaceId) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().entry(workspace_id.clone()).or_default().push(tx);
        Subscription { workspace_id, receiver: rx }
    }

    /// Fan out to every live subscriber of `workspace_id`, dropping the
    /// event for any subscriber whose buffer is already full and pruning
    /// subscribers that have been dropped entirely.
    pub fn publish(&self, workspace_id: &WorkspaceId) {
        let mut subscribers = self.subscribers.lock();
        if let Some(list) = subscribers.get_mut(workspace_id) {
            list.retain(|tx| {
                if tx.is_closed() {
                    return false;
                }
                let _ = tx.try_send(workspace_id.clone());
                true
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let broadcast = Broadcast::new();
        let workspace_id = WorkspaceId::new();
        let mut sub = broadcast.subscribe(workspace_id.clone());

        broadcast.publish(&workspace_id);
        assert_eq!(sub.recv().await, Some(workspace_id));
    }

    #[tokio::test]
    async fn full_buffer_drops_newest_without_panicking() {
        let broadcast = Broadcast::new();
        let workspace_id = WorkspaceId::new();
        let _sub = broadcast.subscribe(workspace_id.clone());

        for _ in 0..(SUBSCRIBER_BUFFER + 5) {
            broadcast.publish(&workspace_id);
        }
    }

    #[tokio::test]
    async fn unrelated_workspace_is_not_notified() {
        let broadcast = Broadcast::new();
        let mut sub = broadcast.subscribe(WorkspaceId::new());
        broadcast.publish(&WorkspaceId::new());

        tokio::time::timeout(std::time::Duration::from_millis(20), sub.recv()).await.unwrap_err();
    }
}
