//! Caller-facing error type.

use std::time::Duration;

use kvwire_core::{CompileError, DecompileError, ErrorKind, ErrorMapEntry, OpCode, Status};

/// Failure reported by a transport while handing off a request or waiting
/// for its reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed; the request was not (or will never be) answered.
    #[error("connection closed")]
    Disconnected,
    /// The outbound queue stayed full for the whole send timeout.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),
}

/// The single typed failure every client operation returns.
///
/// Use [`KvError::kind`] to branch on the failure class; the variants keep the
/// detail needed for logging (raw status, server error map, path position).
#[derive(Debug, Clone, thiserror::Error)]
pub enum KvError {
    #[error("{opcode} failed with status {status}: {kind}")]
    Status {
        kind: ErrorKind,
        status: Status,
        opcode: OpCode,
        error_map: Option<ErrorMapEntry>,
    },
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("operation cancelled")]
    Cancelled,
    #[error("path {index} ({path}) failed with status {status}: {kind}")]
    PathFailure {
        index: usize,
        path: String,
        kind: ErrorKind,
        status: Status,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] CompileError),
    #[error("malformed multi-path reply: {0}")]
    Protocol(#[from] DecompileError),
    #[error("failed to decode reply: {0}")]
    Decode(String),
    #[error("too many operations in flight, try again later")]
    Overloaded,
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl KvError {
    /// The error kind this failure belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvError::Status { kind, .. } | KvError::PathFailure { kind, .. } => *kind,
            KvError::Timeout { .. } => ErrorKind::Timeout,
            KvError::Cancelled => ErrorKind::Cancelled,
            KvError::InvalidRequest(_) => ErrorKind::InvalidArgument,
            KvError::Protocol(_) | KvError::Decode(_) => ErrorKind::Protocol,
            KvError::Overloaded => ErrorKind::TemporaryFailure,
            KvError::Transport(_) => ErrorKind::Internal,
        }
    }

    /// The raw server status, when the failure came from the server.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            KvError::Status { status, .. } | KvError::PathFailure { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        KvError::Decode(msg.into())
    }
}
