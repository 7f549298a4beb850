//! Framed envelopes exchanged over the persistent Control-Agent channel.
//!
//! The channel is bidirectional: Control sends `ControlFrame::Request`s and
//! the agent answers with `AgentFrame::Response`s correlated by
//! `request_id`; the agent can also push `AgentFrame::Notify` fire-and-forget
//! frames (no response expected, ever) and reports its version once on
//! connect via `AgentFrame::Hello`.

use crate::commands::{RequestCommand, ResponseCommand};
use graymoon_core::{RepositoryId, RequestId, WorkspaceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ControlFrame {
    Request { request_id: RequestId, command: RequestCommand },
}

/// A repository whose local clone drifted from its upstream, detected by
/// the agent's notify handler after a webhook fires. Fire-and-forget:
/// control schedules a sync but never answers the agent directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncCommand {
    pub workspace_id: WorkspaceId,
    pub repository_id: RepositoryId,
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub has_upstream: bool,
}

/// Version handshake sent by the agent immediately after (re)connecting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSemVer {
    pub semver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AgentFrame {
    Hello { report: ReportSemVer },
    Response { request_id: RequestId, result: ResponseCommand },
    Notify { command: SyncCommand },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{decode, encode};

    #[test]
    fn control_frame_roundtrips_through_json() {
        let frame = ControlFrame::Request {
            request_id: RequestId::new(),
            command: RequestCommand::GetWorkspaceExists {
                workspace_id: graymoon_core::WorkspaceId::new(),
                root_path: "/srv/workspaces/w1".into(),
            },
        };
        let bytes = encode(&frame).expect("encode");
        let decoded: ControlFrame = decode(&bytes).expect("decode");
        assert_eq!(frame, decoded);
    }

    #[test]
    fn agent_frame_notify_has_no_request_id() {
        let frame = AgentFrame::Notify {
            command: SyncCommand {
                workspace_id: graymoon_core::WorkspaceId::new(),
                repository_id: RepositoryId::new(),
                branch: "main".into(),
                ahead: 2,
                behind: 0,
                has_upstream: true,
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("request_id").is_none());
    }
}
