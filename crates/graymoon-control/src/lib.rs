//! Control Service: accepts the agent's persistent RPC connection, runs
//! the sync pipeline and dependency-ordered push scheduler, and serves the
//! HTTP surface the UI and VCS hooks talk to.

pub mod agent_bridge;
pub mod broadcast;
pub mod config;
pub mod correlator;
pub mod dependency_solver;
pub mod http;
pub mod push_scheduler;
pub mod registry_prober;
pub mod rpc_hub;
pub mod store;
pub mod sync_queue;

pub use agent_bridge::AgentBridge;
pub use broadcast::Broadcast;
pub use config::ControlSettings;
pub use push_scheduler::PushScheduler;
pub use registry_prober::RegistryProber;
pub use rpc_hub::RpcHub;
pub use sync_queue::SyncQueue;
