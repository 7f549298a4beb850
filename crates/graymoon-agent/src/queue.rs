//! Bounded FIFO queue feeding the agent's worker pool.
//!
//! Backed directly by `tokio::mpsc`'s bounded channel: `push` awaits when
//! the queue is full, which is exactly the backpressure behaviour wanted
//! here rather than something to build on top of the channel.

use graymoon_core::JobEnvelope;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct JobQueueHandle {
    sender: mpsc::Sender<JobEnvelope>,
    depth: Arc<AtomicUsize>,
}

pub struct JobQueueReceiver {
    receiver: mpsc::Receiver<JobEnvelope>,
    depth: Arc<AtomicUsize>,
}

/// Create a bounded queue with the given capacity. Producers calling
/// `push` block (asynchronously) once `capacity` envelopes are in flight;
/// dropping every `JobQueueHandle` closes the queue for the receiver.
pub fn job_queue(capacity: usize) -> (JobQueueHandle, JobQueueReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    let depth = Arc::new(AtomicUsize::new(0));
    (JobQueueHandle { sender, depth: depth.clone() }, JobQueueReceiver { receiver, depth })
}

impl JobQueueHandle {
    /// Enqueue an envelope, waiting for room if the queue is full.
    pub async fn push(&self, envelope: JobEnvelope) -> Result<(), JobEnvelope> {
        self.sender.send(envelope).await.map_err(|e| e.0)?;
        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Number of envelopes currently queued, for the queue-depth gauge.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl JobQueueReceiver {
    /// Pull the next envelope, or `None` once every handle has been dropped
    /// and the queue has drained — the signal for a worker to exit.
    pub async fn pop(&mut self) -> Option<JobEnvelope> {
        let envelope = self.receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graymoon_core::{JobEnvelope, RequestId};
    use serde_json::json;

    #[tokio::test]
    async fn push_then_pop_roundtrips_fifo() {
        let (handle, mut rx) = job_queue(4);
        handle.push(JobEnvelope::command(RequestId::new(), "Ping", json!({}))).await.unwrap();
        handle.push(JobEnvelope::command(RequestId::new(), "Pong", json!({}))).await.unwrap();

        let first = rx.pop().await.unwrap();
        match first {
            JobEnvelope::Command { command, .. } => assert_eq!(command, "Ping"),
            _ => panic!("expected Command"),
        }
    }

    #[tokio::test]
    async fn pop_returns_none_once_all_handles_dropped() {
        let (handle, mut rx) = job_queue(4);
        drop(handle);
        assert!(rx.pop().await.is_none());
    }

    #[tokio::test]
    async fn push_blocks_when_queue_is_full() {
        let (handle, mut rx) = job_queue(1);
        handle.push(JobEnvelope::command(RequestId::new(), "A", json!({}))).await.unwrap();

        let handle2 = handle.clone();
        let blocked = tokio::spawn(async move {
            handle2.push(JobEnvelope::command(RequestId::new(), "B", json!({}))).await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        rx.pop().await.unwrap();
        blocked.await.unwrap();
    }
}
