use anyhow::{Context, Result};
use clap::Parser;
use graymoon_control::http::{router, ApiState};
use graymoon_control::store::in_memory::InMemoryStore;
use graymoon_control::{AgentBridge, Broadcast, ControlSettings, PushScheduler, RpcHub, SyncQueue};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "graymoon-controld", about = "GrayMoon control service")]
struct Args {
    /// Path to the control service's TOML config file.
    #[arg(long, default_value = "/etc/graymoon/control.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let settings = ControlSettings::load_from_file(&args.config).context("loading control config")?;
    settings.validate().context("validating control config")?;

    let shutdown = CancellationToken::new();
    let store: Arc<dyn graymoon_control::store::Store> = Arc::new(InMemoryStore::new());

    let (hub, mut agent_notifies) = RpcHub::new();
    let bridge = Arc::new(AgentBridge::new(hub.clone()));
    let broadcast = Arc::new(Broadcast::new());
    let sync_queue = SyncQueue::spawn(
        store.clone(),
        bridge.clone(),
        broadcast.clone(),
        settings.sync.max_concurrency,
        shutdown.clone(),
    );
    let push_scheduler = Arc::new(
        PushScheduler::new(store.clone(), bridge.clone(), broadcast.clone())
            .with_concurrency(settings.workspace.max_concurrent_git_operations)
            .with_timeout_minutes_per_dependency(settings.workspace.push_wait_dependency_timeout_minutes_per_dependency),
    );

    let forward_agent_notifies = {
        let store = store.clone();
        let broadcast = broadcast.clone();
        tokio::spawn(async move {
            while let Some(command) = agent_notifies.recv().await {
                let mut link = match store.get_link(&command.workspace_id, &command.repository_id).await {
                    Ok(link) => link,
                    Err(err) => {
                        tracing::warn!(error = %err, "agent notify for unknown workspace/repository link");
                        continue;
                    }
                };
                link.current_branch = Some(command.branch.clone());
                link.ahead = command.ahead;
                link.behind = command.behind;
                link.has_upstream = command.has_upstream;
                link.status = graymoon_core::LinkSyncStatus::InSync;
                link.last_error = None;
                if let Err(err) = store.upsert_link(link).await {
                    tracing::warn!(error = %err, "agent notify: failed to persist link");
                    continue;
                }
                broadcast.publish(&command.workspace_id);
            }
        })
    };

    let rpc_hub_task = {
        let hub = hub.clone();
        let shutdown = shutdown.clone();
        let addr = SocketAddr::from(([0, 0, 0, 0], settings.rpc_listen_port));
        tokio::spawn(async move {
            if let Err(err) = hub.serve(addr, shutdown).await {
                tracing::error!(error = %err, "rpc hub exited");
            }
        })
    };

    let http_task = {
        let shutdown = shutdown.clone();
        let addr = SocketAddr::from(([0, 0, 0, 0], settings.http_listen_port));
        let state = ApiState { store: store.clone(), bridge, sync_queue, broadcast, push_scheduler };
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!(error = %err, "http listener bind failed");
                    return;
                }
            };
            let app = router(state);
            if let Err(err) =
                axum::serve(listener, app).with_graceful_shutdown(async move { shutdown.cancelled().await }).await
            {
                tracing::error!(error = %err, "http server exited");
            }
        })
    };

    info!(
        rpc_listen_port = settings.rpc_listen_port,
        http_listen_port = settings.http_listen_port,
        "graymoon-controld started"
    );

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    shutdown.cancel();

    let _ = rpc_hub_task.await;
    let _ = http_task.await;
    let _ = forward_agent_notifies.await;

    Ok(())
}
