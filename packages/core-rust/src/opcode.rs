//! Document-level opcodes and durability levels.

use std::fmt;

use crate::status::Status;

/// A document-level command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Get = 0x00,
    Set = 0x01,
    Add = 0x02,
    Replace = 0x03,
    Delete = 0x04,
    Increment = 0x05,
    Decrement = 0x06,
    Append = 0x0e,
    Prepend = 0x0f,
    Touch = 0x1c,
    GetAndTouch = 0x1d,
    GetAndLock = 0x94,
    Unlock = 0x95,
    GetMeta = 0xa0,
    MultiLookup = 0xd0,
    MultiMutation = 0xd1,
}

impl OpCode {
    /// The raw wire value.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Lowercase name used in logs and metrics labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Get => "get",
            OpCode::Set => "set",
            OpCode::Add => "add",
            OpCode::Replace => "replace",
            OpCode::Delete => "delete",
            OpCode::Increment => "increment",
            OpCode::Decrement => "decrement",
            OpCode::Append => "append",
            OpCode::Prepend => "prepend",
            OpCode::Touch => "touch",
            OpCode::GetAndTouch => "get_and_touch",
            OpCode::GetAndLock => "get_and_lock",
            OpCode::Unlock => "unlock",
            OpCode::GetMeta => "get_meta",
            OpCode::MultiLookup => "multi_lookup",
            OpCode::MultiMutation => "multi_mutation",
        }
    }

    /// Whether the command changes the document.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            OpCode::Set
                | OpCode::Add
                | OpCode::Replace
                | OpCode::Delete
                | OpCode::Increment
                | OpCode::Decrement
                | OpCode::Append
                | OpCode::Prepend
                | OpCode::Touch
                | OpCode::MultiMutation
        )
    }

    /// Whether a reply with `status` carries a body this command can decode.
    ///
    /// Multi-path commands also accept the multi-path failure statuses: the
    /// per-path results are in the body and individual failures are reported
    /// there.
    #[must_use]
    pub const fn accepts(self, status: Status) -> bool {
        if status.is_success() {
            return true;
        }
        matches!(self, OpCode::MultiLookup | OpCode::MultiMutation)
            && status.is_multi_path_failure()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Synchronous replication level requested for a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DurabilityLevel {
    #[default]
    None = 0,
    Majority = 1,
    MajorityAndPersistToActive = 2,
    PersistToMajority = 3,
}

impl DurabilityLevel {
    /// The raw wire value.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether a durability frame needs to be sent at all.
    #[must_use]
    pub const fn is_requested(self) -> bool {
        !matches!(self, DurabilityLevel::None)
    }
}
