//! Envelope types flowing through the agent's internal job queue.
//!
//! Kept independent of the wire crate's concrete command payloads (which
//! depend on `graymoon-core`, not the reverse) by carrying the command name
//! and a raw JSON body; the dispatcher is responsible for deserializing the
//! body into the command's typed argument struct.

use crate::ids::{RepositoryId, RequestId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEnvelope {
    /// A request that expects a `ResponseCommand` correlated by `request_id`.
    Command { request_id: RequestId, command: String, args: Value },
    /// Fire-and-forget notification; no response is ever sent back.
    Notify { payload: NotifyPayload },
}

impl JobEnvelope {
    pub fn command(request_id: RequestId, command: impl Into<String>, args: Value) -> Self {
        Self::Command { request_id, command: command.into(), args }
    }

    pub fn notify(payload: NotifyPayload) -> Self {
        Self::Notify { payload }
    }
}

/// Payload delivered by a VCS host webhook, naming the repository and
/// workspace whose local checkout changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub repository_id: RepositoryId,
    pub workspace_id: WorkspaceId,
    pub repository_path: String,
}
