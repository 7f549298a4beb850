//! Shared error kinds for the GrayMoon core.
//!
//! Agent-side handlers never let this type unwind across the RPC boundary:
//! the dispatcher catches it and serializes `to_string()` into
//! `ResponseCommand.error`. Control-side callers match on variants to
//! decide retry/escalation behavior (e.g. `DependencyUnsatisfied` stops
//! further push levels but does not fail earlier ones).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrayMoonError {
    #[error("Agent not connected. Start the host agent to sync repositories.")]
    AgentDisconnected,

    #[error("agent command timed out")]
    AgentTimeout,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("vcs operation failed: {0}")]
    VcsFailure(String),

    #[error("merge conflict in repository")]
    MergeConflict,

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("dependency cycle detected among repositories: {0:?}")]
    CycleDetected(Vec<String>),

    #[error("package registry unavailable")]
    RegistryUnavailable,

    #[error("dependency {package}@{version} not in registry")]
    DependencyUnsatisfied { package: String, version: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    InternalError(String),
}

impl GrayMoonError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound { kind: kind.into(), id: id.into() }
    }

    /// User-visible, concise message; internal details go to logs, not the
    /// caller-facing string.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, GrayMoonError>;
