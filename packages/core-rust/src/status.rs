//! Response status codes of the binary key-value protocol.
//!
//! The status set is closed: a transport converts the raw `u16` from the reply
//! header with [`Status::try_from`], so every value that reaches the classifier
//! is a member of [`Status::ALL`].

use std::fmt;

/// Error returned when a raw status code is not part of the protocol enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown response status 0x{0:04x}")]
pub struct StatusError(pub u16);

/// A protocol-level response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Status {
    Success = 0x00,
    KeyNotFound = 0x01,
    KeyExists = 0x02,
    ValueTooLarge = 0x03,
    InvalidArguments = 0x04,
    ItemNotStored = 0x05,
    IncrDecrOnNonNumericValue = 0x06,
    VBucketBelongsToAnotherServer = 0x07,
    BucketNotConnected = 0x08,
    Locked = 0x09,
    AuthStale = 0x1f,
    AuthenticationError = 0x20,
    AuthenticationContinue = 0x21,
    InvalidRange = 0x22,
    Rollback = 0x23,
    AccessError = 0x24,
    NotInitialized = 0x25,
    UnknownCommand = 0x81,
    OutOfMemory = 0x82,
    NotSupported = 0x83,
    InternalError = 0x84,
    Busy = 0x85,
    TemporaryFailure = 0x86,
    DurabilityInvalidLevel = 0xa0,
    DurabilityImpossible = 0xa1,
    SyncWriteInProgress = 0xa2,
    SyncWriteAmbiguous = 0xa3,
    SubDocPathNotFound = 0xc0,
    SubDocPathMismatch = 0xc1,
    SubDocPathInvalid = 0xc2,
    SubDocPathTooBig = 0xc3,
    SubDocDocTooDeep = 0xc4,
    SubDocCannotInsert = 0xc5,
    SubDocDocNotJson = 0xc6,
    SubDocNumRange = 0xc7,
    SubDocDeltaRange = 0xc8,
    SubDocPathExists = 0xc9,
    SubDocValueTooDeep = 0xca,
    SubDocInvalidCombo = 0xcb,
    SubDocMultiPathFailure = 0xcc,
    SubDocSuccessDeleted = 0xcd,
    SubDocXattrInvalidFlagCombo = 0xce,
    SubDocXattrInvalidKeyCombo = 0xcf,
    SubDocXattrUnknownMacro = 0xd0,
    SubDocXattrUnknownVattr = 0xd1,
    SubDocXattrCantModifyVattr = 0xd2,
    SubDocMultiPathFailureDeleted = 0xd3,
    SubDocInvalidXattrOrder = 0xd4,
}

/// Number of members in the status enumeration.
pub const STATUS_COUNT: usize = 48;

impl Status {
    /// Every status in ascending code order.
    pub const ALL: [Status; STATUS_COUNT] = [
        Status::Success,
        Status::KeyNotFound,
        Status::KeyExists,
        Status::ValueTooLarge,
        Status::InvalidArguments,
        Status::ItemNotStored,
        Status::IncrDecrOnNonNumericValue,
        Status::VBucketBelongsToAnotherServer,
        Status::BucketNotConnected,
        Status::Locked,
        Status::AuthStale,
        Status::AuthenticationError,
        Status::AuthenticationContinue,
        Status::InvalidRange,
        Status::Rollback,
        Status::AccessError,
        Status::NotInitialized,
        Status::UnknownCommand,
        Status::OutOfMemory,
        Status::NotSupported,
        Status::InternalError,
        Status::Busy,
        Status::TemporaryFailure,
        Status::DurabilityInvalidLevel,
        Status::DurabilityImpossible,
        Status::SyncWriteInProgress,
        Status::SyncWriteAmbiguous,
        Status::SubDocPathNotFound,
        Status::SubDocPathMismatch,
        Status::SubDocPathInvalid,
        Status::SubDocPathTooBig,
        Status::SubDocDocTooDeep,
        Status::SubDocCannotInsert,
        Status::SubDocDocNotJson,
        Status::SubDocNumRange,
        Status::SubDocDeltaRange,
        Status::SubDocPathExists,
        Status::SubDocValueTooDeep,
        Status::SubDocInvalidCombo,
        Status::SubDocMultiPathFailure,
        Status::SubDocSuccessDeleted,
        Status::SubDocXattrInvalidFlagCombo,
        Status::SubDocXattrInvalidKeyCombo,
        Status::SubDocXattrUnknownMacro,
        Status::SubDocXattrUnknownVattr,
        Status::SubDocXattrCantModifyVattr,
        Status::SubDocMultiPathFailureDeleted,
        Status::SubDocInvalidXattrOrder,
    ];

    /// The raw wire value.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Position of this status in [`Status::ALL`].
    ///
    /// The match is exhaustive, so adding a variant without giving it a slot
    /// fails to compile.
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Status::Success => 0,
            Status::KeyNotFound => 1,
            Status::KeyExists => 2,
            Status::ValueTooLarge => 3,
            Status::InvalidArguments => 4,
            Status::ItemNotStored => 5,
            Status::IncrDecrOnNonNumericValue => 6,
            Status::VBucketBelongsToAnotherServer => 7,
            Status::BucketNotConnected => 8,
            Status::Locked => 9,
            Status::AuthStale => 10,
            Status::AuthenticationError => 11,
            Status::AuthenticationContinue => 12,
            Status::InvalidRange => 13,
            Status::Rollback => 14,
            Status::AccessError => 15,
            Status::NotInitialized => 16,
            Status::UnknownCommand => 17,
            Status::OutOfMemory => 18,
            Status::NotSupported => 19,
            Status::InternalError => 20,
            Status::Busy => 21,
            Status::TemporaryFailure => 22,
            Status::DurabilityInvalidLevel => 23,
            Status::DurabilityImpossible => 24,
            Status::SyncWriteInProgress => 25,
            Status::SyncWriteAmbiguous => 26,
            Status::SubDocPathNotFound => 27,
            Status::SubDocPathMismatch => 28,
            Status::SubDocPathInvalid => 29,
            Status::SubDocPathTooBig => 30,
            Status::SubDocDocTooDeep => 31,
            Status::SubDocCannotInsert => 32,
            Status::SubDocDocNotJson => 33,
            Status::SubDocNumRange => 34,
            Status::SubDocDeltaRange => 35,
            Status::SubDocPathExists => 36,
            Status::SubDocValueTooDeep => 37,
            Status::SubDocInvalidCombo => 38,
            Status::SubDocMultiPathFailure => 39,
            Status::SubDocSuccessDeleted => 40,
            Status::SubDocXattrInvalidFlagCombo => 41,
            Status::SubDocXattrInvalidKeyCombo => 42,
            Status::SubDocXattrUnknownMacro => 43,
            Status::SubDocXattrUnknownVattr => 44,
            Status::SubDocXattrCantModifyVattr => 45,
            Status::SubDocMultiPathFailureDeleted => 46,
            Status::SubDocInvalidXattrOrder => 47,
        }
    }

    /// Whether the status reports a successful operation.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Status::Success | Status::SubDocSuccessDeleted)
    }

    /// Whether the status reports a multi-path request where some paths failed.
    #[must_use]
    pub const fn is_multi_path_failure(self) -> bool {
        matches!(
            self,
            Status::SubDocMultiPathFailure | Status::SubDocMultiPathFailureDeleted
        )
    }
}

// Ordinals must agree with `ALL`, and `ALL` must be strictly ascending.
const _: () = {
    let mut i = 0;
    while i < STATUS_COUNT {
        assert!(Status::ALL[i].ordinal() == i);
        if i > 0 {
            assert!(Status::ALL[i - 1].code() < Status::ALL[i].code());
        }
        i += 1;
    }
};

impl TryFrom<u16> for Status {
    type Error = StatusError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Status::ALL
            .binary_search_by_key(&code, |s| s.code())
            .map(|idx| Status::ALL[idx])
            .map_err(|_| StatusError(code))
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} (0x{:02x})", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_member_round_trips_through_its_code() {
        for status in Status::ALL {
            assert_eq!(Status::try_from(status.code()), Ok(status));
        }
    }

    #[test]
    fn codes_outside_the_enumeration_are_rejected() {
        assert_eq!(Status::try_from(0x0a), Err(StatusError(0x0a)));
        assert_eq!(Status::try_from(0x87), Err(StatusError(0x87)));
        assert_eq!(Status::try_from(0xffff), Err(StatusError(0xffff)));
    }

    #[test]
    fn only_two_success_codes() {
        let successes: Vec<_> = Status::ALL.iter().filter(|s| s.is_success()).collect();
        assert_eq!(
            successes,
            vec![&Status::Success, &Status::SubDocSuccessDeleted]
        );
    }

    #[test]
    fn display_includes_hex_code() {
        assert_eq!(Status::KeyNotFound.to_string(), "KeyNotFound (0x01)");
        assert_eq!(Status::SubDocPathNotFound.to_string(), "SubDocPathNotFound (0xc0)");
    }
}
