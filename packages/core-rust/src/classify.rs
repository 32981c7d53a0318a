//! Status classification: converts a non-success `Status` into an `ErrorKind`.
//!
//! The mapping is a static table indexed by [`Status::ordinal`]. A const
//! assertion checks at build time that the table lists every status exactly
//! once, in the same order as [`Status::ALL`].

use crate::error_kind::ErrorKind;
use crate::error_map::ErrorMapEntry;
use crate::status::{Status, STATUS_COUNT};

/// What a status means to the caller: success, or one failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    Failure(ErrorKind),
}

use Disposition::{Failure, Success};

// ---------------------------------------------------------------------------
// Lookup table
// ---------------------------------------------------------------------------

const STATUS_TABLE: [(Status, Disposition); STATUS_COUNT] = [
    (Status::Success, Success),
    (Status::KeyNotFound, Failure(ErrorKind::NotFound)),
    (Status::KeyExists, Failure(ErrorKind::AlreadyExists)),
    (Status::ValueTooLarge, Failure(ErrorKind::TooLarge)),
    (Status::InvalidArguments, Failure(ErrorKind::InvalidArgument)),
    // Only returned for append/prepend against a missing document.
    (Status::ItemNotStored, Failure(ErrorKind::NotFound)),
    (Status::IncrDecrOnNonNumericValue, Failure(ErrorKind::InvalidArgument)),
    (Status::VBucketBelongsToAnotherServer, Failure(ErrorKind::Internal)),
    (Status::BucketNotConnected, Failure(ErrorKind::Internal)),
    (Status::Locked, Failure(ErrorKind::Locked)),
    (Status::AuthStale, Failure(ErrorKind::Internal)),
    (Status::AuthenticationError, Failure(ErrorKind::Auth)),
    (Status::AuthenticationContinue, Failure(ErrorKind::Internal)),
    (Status::InvalidRange, Failure(ErrorKind::InvalidArgument)),
    (Status::Rollback, Failure(ErrorKind::Internal)),
    (Status::AccessError, Failure(ErrorKind::Auth)),
    (Status::NotInitialized, Failure(ErrorKind::Internal)),
    (Status::UnknownCommand, Failure(ErrorKind::Internal)),
    (Status::OutOfMemory, Failure(ErrorKind::TemporaryFailure)),
    (Status::NotSupported, Failure(ErrorKind::Internal)),
    (Status::InternalError, Failure(ErrorKind::Internal)),
    (Status::Busy, Failure(ErrorKind::TemporaryFailure)),
    (Status::TemporaryFailure, Failure(ErrorKind::TemporaryFailure)),
    (Status::DurabilityInvalidLevel, Failure(ErrorKind::Durability)),
    (Status::DurabilityImpossible, Failure(ErrorKind::Durability)),
    (Status::SyncWriteInProgress, Failure(ErrorKind::Durability)),
    (Status::SyncWriteAmbiguous, Failure(ErrorKind::Durability)),
    (Status::SubDocPathNotFound, Failure(ErrorKind::PathNotFound)),
    (Status::SubDocPathMismatch, Failure(ErrorKind::PathMismatch)),
    (Status::SubDocPathInvalid, Failure(ErrorKind::PathInvalid)),
    (Status::SubDocPathTooBig, Failure(ErrorKind::PathTooBig)),
    (Status::SubDocDocTooDeep, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocCannotInsert, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocDocNotJson, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocNumRange, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocDeltaRange, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocPathExists, Failure(ErrorKind::AlreadyExists)),
    (Status::SubDocValueTooDeep, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocInvalidCombo, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocMultiPathFailure, Failure(ErrorKind::Internal)),
    (Status::SubDocSuccessDeleted, Success),
    (Status::SubDocXattrInvalidFlagCombo, Failure(ErrorKind::Internal)),
    (Status::SubDocXattrInvalidKeyCombo, Failure(ErrorKind::Internal)),
    (Status::SubDocXattrUnknownMacro, Failure(ErrorKind::InvalidArgument)),
    (Status::SubDocXattrUnknownVattr, Failure(ErrorKind::Internal)),
    (Status::SubDocXattrCantModifyVattr, Failure(ErrorKind::Internal)),
    (Status::SubDocMultiPathFailureDeleted, Failure(ErrorKind::Internal)),
    (Status::SubDocInvalidXattrOrder, Failure(ErrorKind::Internal)),
];

const _: () = {
    let mut i = 0;
    while i < STATUS_COUNT {
        let (status, disposition) = STATUS_TABLE[i];
        assert!(status.code() == Status::ALL[i].code());
        // Success codes and `Disposition::Success` must coincide.
        assert!(status.is_success() == matches!(disposition, Disposition::Success));
        i += 1;
    }
};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Returns the table entry for `status`.
#[must_use]
pub const fn disposition(status: Status) -> Disposition {
    STATUS_TABLE[status.ordinal()].1
}

/// Classifies a non-success status into the error kind reported to the caller.
///
/// The server error map is accepted so the signature mirrors what arrives in a
/// reply envelope, but it never influences the result: it is diagnostic detail
/// only.
///
/// # Panics
///
/// Panics if `status` is a success code. Success never reaches the classifier;
/// doing so is a programming error in the caller.
#[must_use]
pub fn classify(status: Status, error_map: Option<&ErrorMapEntry>) -> ErrorKind {
    match disposition(status) {
        Disposition::Failure(kind) => {
            if let Some(entry) = error_map {
                tracing::trace!(%status, name = %entry.name, "classified status with error map");
            }
            kind
        }
        Disposition::Success => panic!("classify called with success status {status}"),
    }
}
