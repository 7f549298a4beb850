//! Typed facade over the RPC hub. Every higher-level service (sync queue,
//! push scheduler, HTTP handlers) talks to the agent only through here.

use crate::rpc_hub::RpcHub;
use graymoon_core::GrayMoonError;
use graymoon_wire::{RequestCommand, ResponseCommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AgentCommandResponse {
    pub success: bool,
    pub data: Option<ResponseCommand>,
    pub error: Option<String>,
}

impl AgentCommandResponse {
    fn ok(data: ResponseCommand) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    fn failed(error: impl std::fmt::Display) -> Self {
        Self { success: false, data: None, error: Some(error.to_string()) }
    }
}

pub struct AgentBridge {
    hub: Arc<RpcHub>,
}

impl AgentBridge {
    pub fn new(hub: Arc<RpcHub>) -> Self {
        Self { hub }
    }

    pub async fn is_agent_connected(&self) -> bool {
        self.hub.is_agent_connected().await
    }

    /// Send `command`; returns success=false without attempting delivery
    /// when no agent is connected, matching the bridge's documented
    /// fail-fast contract. Subject to the hub's default command timeout but
    /// carries no caller-supplied cancellation.
    pub async fn send_command(&self, command: RequestCommand) -> AgentCommandResponse {
        self.send_command_with_cancel(command, &CancellationToken::new()).await
    }

    /// Same as `send_command`, but `cancel` races the hub's wait so a
    /// caller that abandons the operation (a cancelled workspace push, a
    /// shutting-down sync worker) doesn't block on the agent's reply.
    pub async fn send_command_with_cancel(&self, command: RequestCommand, cancel: &CancellationToken) -> AgentCommandResponse {
        if !self.hub.is_agent_connected().await {
            return AgentCommandResponse::failed(GrayMoonError::AgentDisconnected);
        }

        match self.hub.send_command_with_cancel(command, cancel).await {
            Ok(response) if response.is_error() => {
                let message = match &response {
                    ResponseCommand::Error { message } => message.clone(),
                    _ => unreachable!(),
                };
                AgentCommandResponse::failed(message)
            }
            Ok(response) => AgentCommandResponse::ok(response),
            Err(err) => AgentCommandResponse::failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_agent_connected_fails_fast_without_sending() {
        let (hub, _notifies) = RpcHub::new();
        let bridge = AgentBridge::new(hub);

        let response = bridge
            .send_command(RequestCommand::GetWorkspaceExists {
                workspace_id: graymoon_core::WorkspaceId::new(),
                root_path: "/w".to_string(),
            })
            .await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some(GrayMoonError::AgentDisconnected.to_string().as_str()));
    }
}
