use anyhow::{Context, Result};
use clap::Parser;
use graymoon_agent::{job_queue, AgentSettings, AgentState, Dispatcher, GitCliExecutor, NotifyHandler, WorkerPool};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "graymoon-agentd", about = "Host-resident GrayMoon agent")]
struct Args {
    /// Path to the agent's TOML config file.
    #[arg(long, default_value = "/etc/graymoon/agent.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let settings = AgentSettings::load_from_file(&args.config).context("loading agent config")?;
    settings.validate().context("validating agent config")?;

    std::fs::create_dir_all(&settings.workspace_root).context("creating workspace root")?;

    let shutdown = CancellationToken::new();
    let (queue, receiver) = job_queue(settings.queue_capacity());

    let state = Arc::new(AgentState::new());
    let vcs = Arc::new(GitCliExecutor::new());
    let dispatcher = Arc::new(Dispatcher::new(state.clone(), vcs.clone()));

    let (notify_tx, mut notify_rx) = tokio::sync::mpsc::unbounded_channel();
    let notify_handler = Arc::new(NotifyHandler::new(state.clone(), vcs.clone(), notify_tx));

    let rpc_link = graymoon_agent::rpc_link::run(settings.app_hub_url.clone(), queue.clone(), shutdown.clone());

    let forward_notifies = {
        let rpc_link = rpc_link.clone();
        tokio::spawn(async move {
            while let Some(command) = notify_rx.recv().await {
                rpc_link.notify(command);
            }
        })
    };

    let worker_handles = WorkerPool::new(settings.max_concurrent_commands).spawn(
        receiver,
        dispatcher,
        notify_handler,
        rpc_link,
        shutdown.clone(),
    );

    let hook_listener = {
        let queue = queue.clone();
        let shutdown = shutdown.clone();
        let listen_port = settings.listen_port;
        tokio::spawn(async move {
            if let Err(err) = graymoon_agent::hook_listener::serve(listen_port, queue, shutdown).await {
                tracing::error!(error = %err, "hook listener exited");
            }
        })
    };

    info!(app_hub_url = %settings.app_hub_url, listen_port = settings.listen_port, "graymoon-agentd started");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    shutdown.cancel();

    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = hook_listener.await;
    let _ = forward_notifies.await;

    Ok(())
}
