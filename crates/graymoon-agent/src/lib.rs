//! Host-resident agent: job queue, dispatcher, notify handler, hook
//! listener, VCS executor, project-file parser, and the persistent RPC
//! link back to the Control Service.

pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod hook_listener;
pub mod notify;
pub mod project_parser;
pub mod project_refresh;
pub mod queue;
pub mod rpc_link;
pub mod state;
pub mod vcs;
pub mod worker_pool;

pub use backoff::Backoff;
pub use config::AgentSettings;
pub use dispatcher::Dispatcher;
pub use notify::NotifyHandler;
pub use queue::{job_queue, JobQueueHandle, JobQueueReceiver};
pub use rpc_link::RpcLinkHandle;
pub use state::AgentState;
pub use vcs::{GitCliExecutor, VcsExecutor};
pub use worker_pool::WorkerPool;
