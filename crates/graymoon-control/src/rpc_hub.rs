//! Accepts the single persistent connection from a host agent. At most one
//! agent is considered current; a second connection replaces it and the
//! old socket is torn down. An accept-loop-plus-spawned-task-per-connection
//! shape, generalized from one-shot request/response to a long-lived
//! multiplexed session.

use crate::correlator::{self, Correlator};
use graymoon_core::{GrayMoonError, RequestId, Result};
use graymoon_wire::{read_json, write_json, AgentFrame, ControlFrame, RequestCommand, ResponseCommand, SyncCommand};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Caller-overridable via `send_command_with_cancel`'s own deadline; this is
/// the default applied to every request so a stuck agent-side command can
/// never block its caller forever.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

struct Session {
    generation: u64,
    outbound: mpsc::UnboundedSender<ControlFrame>,
    cancel: CancellationToken,
    reported_semver: Option<String>,
}

pub struct RpcHub {
    correlator: Arc<Correlator>,
    current: AsyncMutex<Option<Session>>,
    generations: AtomicU64,
    notifies: mpsc::UnboundedSender<SyncCommand>,
}

impl RpcHub {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SyncCommand>) {
        let (notifies, notify_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(Self {
            correlator: Arc::new(Correlator::new()),
            current: AsyncMutex::new(None),
            generations: AtomicU64::new(0),
            notifies,
        });
        (hub, notify_rx)
    }

    pub async fn is_agent_connected(&self) -> bool {
        self.current.lock().await.is_some()
    }

    pub async fn reported_semver(&self) -> Option<String> {
        self.current.lock().await.as_ref().and_then(|s| s.reported_semver.clone())
    }

    /// Send a request to the current agent and await its response, or fail
    /// fast with `AgentDisconnected` when nothing is connected. Applies the
    /// default command timeout with no caller-supplied cancellation.
    pub async fn send_command(self: &Arc<Self>, command: RequestCommand) -> Result<ResponseCommand> {
        self.send_command_with_cancel(command, &CancellationToken::new()).await
    }

    /// Same as `send_command`, but also races the wait against `cancel` so
    /// a caller that gives up (workspace push cancelled, worker shutting
    /// down) doesn't keep the request registered in the correlator.
    pub async fn send_command_with_cancel(
        self: &Arc<Self>,
        command: RequestCommand,
        cancel: &CancellationToken,
    ) -> Result<ResponseCommand> {
        let outbound = {
            let current = self.current.lock().await;
            current.as_ref().ok_or(GrayMoonError::AgentDisconnected)?.outbound.clone()
        };

        let request_id = RequestId::new();
        let rx = self.correlator.register(request_id.clone());
        if outbound.send(ControlFrame::Request { request_id: request_id.clone(), command }).is_err() {
            self.correlator.cancel(&request_id);
            return Err(GrayMoonError::AgentDisconnected);
        }

        tokio::select! {
            result = correlator::await_response(rx) => result,
            _ = tokio::time::sleep(DEFAULT_COMMAND_TIMEOUT) => {
                self.correlator.cancel(&request_id);
                Err(GrayMoonError::AgentTimeout)
            }
            _ = cancel.cancelled() => {
                self.correlator.cancel(&request_id);
                Err(GrayMoonError::Cancelled)
            }
        }
    }

    pub async fn serve(self: Arc<Self>, addr: SocketAddr, shutdown: CancellationToken) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "rpc hub listening");
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!(peer = %peer, "agent connection accepted");
                            let hub = self.clone();
                            tokio::spawn(async move { hub.handle_connection(stream).await });
                        }
                        Err(err) => warn!(error = %err, "rpc hub accept error"),
                    }
                }
                _ = shutdown.cancelled() => {
                    let mut current = self.current.lock().await;
                    if let Some(session) = current.take() {
                        session.cancel.cancel();
                    }
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream) {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        {
            let mut current = self.current.lock().await;
            if let Some(old) = current.take() {
                old.cancel.cancel();
            }
            *current = Some(Session { generation, outbound: outbound_tx, cancel: cancel.clone(), reported_semver: None });
        }

        let (mut reader, mut writer) = stream.into_split();
        let result: std::result::Result<(), graymoon_wire::ProtocolError> = async {
            loop {
                tokio::select! {
                    frame = read_json::<_, AgentFrame>(&mut reader) => {
                        match frame? {
                            AgentFrame::Hello { report } => {
                                let mut current = self.current.lock().await;
                                if let Some(session) = current.as_mut() {
                                    if session.generation == generation {
                                        session.reported_semver = Some(report.semver.clone());
                                    }
                                }
                                info!(semver = %report.semver, "agent reported version");
                            }
                            AgentFrame::Response { request_id, result } => {
                                self.correlator.complete(request_id, result);
                            }
                            AgentFrame::Notify { command } => {
                                let _ = self.notifies.send(command);
                            }
                        }
                    }
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(frame) => write_json(&mut writer, &frame).await?,
                            None => return Ok(()),
                        }
                    }
                    _ = cancel.cancelled() => return Ok(()),
                }
            }
        }
        .await;

        if let Err(err) = result {
            warn!(error = %err, "agent connection ended");
        }

        let mut current = self.current.lock().await;
        if matches!(current.as_ref(), Some(session) if session.generation == generation) {
            *current = None;
            drop(current);
            self.correlator.fail_all_pending();
        }
    }
}
