//! Maps an in-flight request id to the oneshot channel its caller is
//! awaiting. Each id is completed at most once: either a response arrives
//! and is delivered, or the agent disconnects and every pending id is
//! failed with `AgentDisconnected`, or the caller cancels and its entry is
//! dropped so a later, late response is silently discarded.

use graymoon_core::{GrayMoonError, RequestId, Result};
use graymoon_wire::ResponseCommand;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<ResponseCommand>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh request id and return the receiver half the caller
    /// should await (racing it against its own cancellation token).
    pub fn register(&self, request_id: RequestId) -> oneshot::Receiver<ResponseCommand> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);
        rx
    }

    /// Deliver a response to its waiter. A response for an id nobody is
    /// waiting on anymore (cancelled or unknown) is silently dropped.
    pub fn complete(&self, request_id: RequestId, result: ResponseCommand) {
        if let Some(tx) = self.pending.lock().remove(&request_id) {
            let _ = tx.send(result);
        }
    }

    /// Drop a registration without delivering anything, used when the
    /// caller's own cancellation fires first.
    pub fn cancel(&self, request_id: &RequestId) {
        self.pending.lock().remove(request_id);
    }

    /// Fail every pending id with `AgentDisconnected`, called when the RPC
    /// hub loses its one active agent connection.
    pub fn fail_all_pending(&self) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(ResponseCommand::error(GrayMoonError::AgentDisconnected));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

pub async fn await_response(rx: oneshot::Receiver<ResponseCommand>) -> Result<ResponseCommand> {
    rx.await.map_err(|_| GrayMoonError::AgentDisconnected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_delivers_to_registered_waiter() {
        let correlator = Correlator::new();
        let request_id = RequestId::new();
        let rx = correlator.register(request_id.clone());

        correlator.complete(request_id, ResponseCommand::Ok);
        assert_eq!(await_response(rx).await.unwrap(), ResponseCommand::Ok);
    }

    #[tokio::test]
    async fn disconnect_fails_all_pending() {
        let correlator = Correlator::new();
        let rx1 = correlator.register(RequestId::new());
        let rx2 = correlator.register(RequestId::new());

        correlator.fail_all_pending();

        assert!(matches!(await_response(rx1).await, Err(GrayMoonError::AgentDisconnected)));
        assert!(matches!(await_response(rx2).await, Err(GrayMoonError::AgentDisconnected)));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancel_removes_entry_so_late_response_is_discarded() {
        let correlator = Correlator::new();
        let request_id = RequestId::new();
        let _rx = correlator.register(request_id.clone());

        correlator.cancel(&request_id);
        correlator.complete(request_id, ResponseCommand::Ok);
        assert_eq!(correlator.pending_count(), 0);
    }
}
