//! Wire types and framing for the Control-Agent RPC channel and the
//! Control Service's HTTP surface.

mod commands;
mod framing;
mod http;
mod rpc;

pub use commands::{DependencySyncEntry, GitVersion, RequestCommand, ResponseCommand};
pub use framing::{decode, encode, read_json, read_message, write_json, write_message, ProtocolError};
pub use http::{
    ApiErrorResponse, CheckoutBranchRequest, CommitSyncRequest, CreateBranchRequest, NotifyHookRequest, PullPushRequest,
    SyncAcceptedResponse, SyncAcceptedStatus, SyncQueueEntry, SyncQueueResponse, SyncRequest, WorkspaceSyncedEvent,
};
pub use rpc::{AgentFrame, ControlFrame, ReportSemVer, SyncCommand};
