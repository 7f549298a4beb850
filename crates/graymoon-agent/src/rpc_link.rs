//! Persistent bidirectional channel to the Control Service. Reconnects
//! forever on any I/O error, reporting the agent's version via `Hello`
//! immediately after each (re)connect.

use crate::backoff::Backoff;
use crate::queue::JobQueueHandle;
use graymoon_core::{JobEnvelope, RequestId};
use graymoon_wire::{read_json, write_json, AgentFrame, ControlFrame, ProtocolError, ReportSemVer, ResponseCommand, SyncCommand};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const AGENT_SEMVER: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
enum LinkError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("job queue closed")]
    QueueClosed,
    #[error("shutting down")]
    Shutdown,
}

#[derive(Clone)]
pub struct RpcLinkHandle {
    outbound: mpsc::UnboundedSender<AgentFrame>,
}

impl RpcLinkHandle {
    pub fn respond(&self, request_id: RequestId, result: ResponseCommand) {
        let _ = self.outbound.send(AgentFrame::Response { request_id, result });
    }

    pub fn notify(&self, command: SyncCommand) {
        let _ = self.outbound.send(AgentFrame::Notify { command });
    }
}

/// Drives the reconnect loop against `app_hub_addr` until `shutdown` fires.
/// Every inbound `ControlFrame::Request` is turned into a `JobEnvelope` and
/// pushed onto the agent's job queue; outbound frames (responses, notifies)
/// are drained from the returned handle's channel.
pub fn run(app_hub_addr: String, queue: JobQueueHandle, shutdown: CancellationToken) -> RpcLinkHandle {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let handle = RpcLinkHandle { outbound: outbound_tx };
    tokio::spawn(reconnect_loop(app_hub_addr, queue, outbound_rx, shutdown));
    handle
}

async fn reconnect_loop(
    app_hub_addr: String,
    queue: JobQueueHandle,
    mut outbound_rx: mpsc::UnboundedReceiver<AgentFrame>,
    shutdown: CancellationToken,
) {
    let mut backoff = Backoff::new();
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        match TcpStream::connect(&app_hub_addr).await {
            Ok(stream) => {
                backoff.reset();
                info!(app_hub_addr = %app_hub_addr, "connected to control");
                if let Err(err) = session(stream, &queue, &mut outbound_rx, &shutdown).await {
                    if matches!(err, LinkError::Shutdown) {
                        return;
                    }
                    warn!(error = %err, "rpc link session ended, reconnecting");
                }
            }
            Err(err) => {
                warn!(error = %err, app_hub_addr = %app_hub_addr, "failed to connect to control");
            }
        }

        if shutdown.is_cancelled() {
            return;
        }
        let delay = backoff.next_delay();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => return,
        }
    }
}

async fn session(
    stream: TcpStream,
    queue: &JobQueueHandle,
    outbound_rx: &mut mpsc::UnboundedReceiver<AgentFrame>,
    shutdown: &CancellationToken,
) -> Result<(), LinkError> {
    let (mut reader, mut writer) = stream.into_split();
    write_json(&mut writer, &AgentFrame::Hello { report: ReportSemVer { semver: AGENT_SEMVER.to_string() } }).await?;

    loop {
        tokio::select! {
            frame = read_json::<_, ControlFrame>(&mut reader) => {
                let ControlFrame::Request { request_id, command } = frame?;
                let args = serde_json::to_value(&command).unwrap_or(serde_json::Value::Null);
                let name = command.name().to_string();
                queue.push(JobEnvelope::command(request_id, name, args)).await.map_err(|_| LinkError::QueueClosed)?;
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => write_json(&mut writer, &frame).await?,
                    None => return Err(LinkError::QueueClosed),
                }
            }
            _ = shutdown.cancelled() => return Err(LinkError::Shutdown),
        }
    }
}
