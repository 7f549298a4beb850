//! N identical workers draining one job queue, routing each envelope to the
//! dispatcher (commands) or notify handler (notifies). Notify and command
//! jobs share the pool so a burst of hooks cannot starve commands: every
//! worker advances to its next envelope as soon as the current one
//! finishes, regardless of which kind it was.

use crate::dispatcher::Dispatcher;
use crate::notify::NotifyHandler;
use crate::queue::JobQueueReceiver;
use crate::rpc_link::RpcLinkHandle;
use graymoon_core::JobEnvelope;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct WorkerPool {
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        Self { worker_count }
    }

    /// Spawn `worker_count` tasks sharing `receiver`; each exits once the
    /// queue drains after `shutdown` fires, or immediately if `shutdown` is
    /// already cancelled and the queue is empty.
    pub fn spawn(
        &self,
        receiver: JobQueueReceiver,
        dispatcher: Arc<Dispatcher>,
        notify_handler: Arc<NotifyHandler>,
        rpc_link: RpcLinkHandle,
        shutdown: CancellationToken,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let receiver = Arc::new(Mutex::new(receiver));
        (0..self.worker_count)
            .map(|id| {
                let receiver = receiver.clone();
                let dispatcher = dispatcher.clone();
                let notify_handler = notify_handler.clone();
                let rpc_link = rpc_link.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(id, receiver, dispatcher, notify_handler, rpc_link, shutdown))
            })
            .collect()
    }
}

async fn worker_loop(
    id: usize,
    receiver: Arc<Mutex<JobQueueReceiver>>,
    dispatcher: Arc<Dispatcher>,
    notify_handler: Arc<NotifyHandler>,
    rpc_link: RpcLinkHandle,
    shutdown: CancellationToken,
) {
    loop {
        let envelope = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                envelope = receiver.pop() => envelope,
                _ = shutdown.cancelled() => None,
            }
        };

        let Some(envelope) = envelope else {
            info!(worker_id = id, "worker exiting, queue drained");
            return;
        };

        match envelope {
            JobEnvelope::Command { request_id, command, args } => {
                let mut tagged = args;
                match tagged.as_object_mut() {
                    Some(obj) => {
                        obj.insert("command".to_string(), serde_json::Value::String(command));
                    }
                    None => {
                        rpc_link.respond(request_id, graymoon_wire::ResponseCommand::error("malformed command payload"));
                        continue;
                    }
                }
                let Ok(command) = serde_json::from_value::<graymoon_wire::RequestCommand>(tagged) else {
                    rpc_link.respond(request_id, graymoon_wire::ResponseCommand::error("malformed command payload"));
                    continue;
                };
                let response = dispatcher.dispatch(command).await;
                rpc_link.respond(request_id, response);
            }
            JobEnvelope::Notify { payload } => {
                notify_handler.handle(payload).await;
            }
        }
    }
}
