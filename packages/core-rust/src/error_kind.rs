//! Caller-actionable error taxonomy.

use std::fmt;

/// The kind of failure an operation produced.
///
/// Produced deterministically from a [`Status`](crate::Status) by
/// [`classify`](crate::classify), or by the client for conditions that never
/// reach the server (deadline, cancellation, malformed replies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The key does not exist.
    NotFound,
    /// A create operation targeted an existing key (or sub-document path).
    AlreadyExists,
    /// The value exceeds the server's size limit.
    TooLarge,
    /// The request was malformed or not applicable to the target document.
    InvalidArgument,
    /// The server is busy, out of memory, or otherwise transiently unable to serve.
    TemporaryFailure,
    /// The deadline elapsed before a reply was delivered.
    Timeout,
    /// The caller cancelled the operation before a reply was delivered.
    Cancelled,
    /// The key is held under a pessimistic lock.
    Locked,
    /// A durability requirement was invalid, impossible, or has an ambiguous outcome.
    Durability,
    /// Access to the resource was denied.
    Auth,
    /// The sub-document path does not exist.
    PathNotFound,
    /// The sub-document path traverses a value of the wrong type.
    PathMismatch,
    /// The sub-document path is syntactically invalid.
    PathInvalid,
    /// The sub-document path is too long or too deep.
    PathTooBig,
    /// Server-internal or unexpected condition the caller cannot act on.
    Internal,
    /// The reply was malformed.
    Protocol,
}

impl ErrorKind {
    /// Stable lowercase name, used as a metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::TemporaryFailure => "temporary_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Locked => "locked",
            ErrorKind::Durability => "durability",
            ErrorKind::Auth => "auth",
            ErrorKind::PathNotFound => "path_not_found",
            ErrorKind::PathMismatch => "path_mismatch",
            ErrorKind::PathInvalid => "path_invalid",
            ErrorKind::PathTooBig => "path_too_big",
            ErrorKind::Internal => "internal",
            ErrorKind::Protocol => "protocol",
        }
    }

    /// Whether this kind describes a single sub-document path rather than the
    /// whole document.
    #[must_use]
    pub const fn is_path_error(self) -> bool {
        matches!(
            self,
            ErrorKind::PathNotFound
                | ErrorKind::PathMismatch
                | ErrorKind::PathInvalid
                | ErrorKind::PathTooBig
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
