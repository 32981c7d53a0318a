//! Path specifications for multi-path sub-document requests.

use std::fmt;

use bytes::Bytes;

use crate::opcode::OpCode;

// ---------------------------------------------------------------------------
// SubdocOpcode
// ---------------------------------------------------------------------------

/// A verb applied to one path of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubdocOpcode {
    /// Full-document read inside a lookup (empty path).
    GetDoc = 0x00,
    /// Full-document replace inside a mutation (empty path).
    SetDoc = 0x01,
    /// Full-document delete inside a mutation (empty path).
    DeleteDoc = 0x04,
    Get = 0xc5,
    Exists = 0xc6,
    DictAdd = 0xc7,
    DictUpsert = 0xc8,
    Delete = 0xc9,
    Replace = 0xca,
    ArrayPushLast = 0xcb,
    ArrayPushFirst = 0xcc,
    ArrayInsert = 0xcd,
    ArrayAddUnique = 0xce,
    Counter = 0xcf,
    GetCount = 0xd2,
}

impl SubdocOpcode {
    /// The raw wire value.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Read verbs, permitted only in lookup requests.
    #[must_use]
    pub const fn is_lookup(self) -> bool {
        matches!(
            self,
            SubdocOpcode::GetDoc | SubdocOpcode::Get | SubdocOpcode::Exists | SubdocOpcode::GetCount
        )
    }

    /// Write and arithmetic verbs, permitted only in mutation requests.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !self.is_lookup()
    }

    /// Whether the verb carries a value payload.
    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(
            self,
            SubdocOpcode::GetDoc
                | SubdocOpcode::Get
                | SubdocOpcode::Exists
                | SubdocOpcode::GetCount
                | SubdocOpcode::Delete
                | SubdocOpcode::DeleteDoc
        )
    }
}

impl fmt::Display for SubdocOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// PathFlags
// ---------------------------------------------------------------------------

/// Per-path flag byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PathFlags(u8);

impl PathFlags {
    pub const NONE: PathFlags = PathFlags(0x00);
    /// Create intermediate dictionaries when they are missing.
    pub const CREATE_PATH: PathFlags = PathFlags(0x01);
    /// The path addresses an extended attribute.
    pub const XATTR: PathFlags = PathFlags(0x04);
    /// Expand server macros such as `${Mutation.CAS}` in the value.
    pub const EXPAND_MACROS: PathFlags = PathFlags(0x10);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn union(self, other: PathFlags) -> PathFlags {
        PathFlags(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: PathFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

// ---------------------------------------------------------------------------
// PathSpec
// ---------------------------------------------------------------------------

/// One path operation inside a multi-path request.
///
/// Paths need not be unique within a request; each spec keeps its own
/// position and gets its own result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    pub opcode: SubdocOpcode,
    pub path: String,
    pub value: Option<Bytes>,
    pub flags: PathFlags,
}

impl PathSpec {
    fn read(opcode: SubdocOpcode, path: impl Into<String>) -> Self {
        Self {
            opcode,
            path: path.into(),
            value: None,
            flags: PathFlags::NONE,
        }
    }

    fn write(opcode: SubdocOpcode, path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            path: path.into(),
            value: Some(value.into()),
            flags: PathFlags::NONE,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::read(SubdocOpcode::Get, path)
    }

    #[must_use]
    pub fn exists(path: impl Into<String>) -> Self {
        Self::read(SubdocOpcode::Exists, path)
    }

    #[must_use]
    pub fn count(path: impl Into<String>) -> Self {
        Self::read(SubdocOpcode::GetCount, path)
    }

    /// Reads the whole document alongside other paths.
    #[must_use]
    pub fn get_doc() -> Self {
        Self::read(SubdocOpcode::GetDoc, "")
    }

    #[must_use]
    pub fn insert(path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::DictAdd, path, value)
    }

    #[must_use]
    pub fn upsert(path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::DictUpsert, path, value)
    }

    #[must_use]
    pub fn replace(path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::Replace, path, value)
    }

    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self::read(SubdocOpcode::Delete, path)
    }

    #[must_use]
    pub fn array_append(path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::ArrayPushLast, path, value)
    }

    #[must_use]
    pub fn array_prepend(path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::ArrayPushFirst, path, value)
    }

    #[must_use]
    pub fn array_insert(path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::ArrayInsert, path, value)
    }

    #[must_use]
    pub fn array_add_unique(path: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::ArrayAddUnique, path, value)
    }

    #[must_use]
    pub fn increment(path: impl Into<String>, delta: u64) -> Self {
        Self::write(SubdocOpcode::Counter, path, delta.to_string())
    }

    #[must_use]
    pub fn decrement(path: impl Into<String>, delta: u64) -> Self {
        Self::write(SubdocOpcode::Counter, path, format!("-{delta}"))
    }

    /// Replaces the whole document body inside a mutation.
    #[must_use]
    pub fn set_doc(value: impl Into<Bytes>) -> Self {
        Self::write(SubdocOpcode::SetDoc, "", value)
    }

    #[must_use]
    pub fn delete_doc() -> Self {
        Self::read(SubdocOpcode::DeleteDoc, "")
    }

    /// Marks the path as addressing an extended attribute.
    #[must_use]
    pub fn xattr(mut self) -> Self {
        self.flags = self.flags.union(PathFlags::XATTR);
        self
    }

    /// Creates missing parent dictionaries.
    #[must_use]
    pub fn create_path(mut self) -> Self {
        self.flags = self.flags.union(PathFlags::CREATE_PATH);
        self
    }
}

// ---------------------------------------------------------------------------
// MultiKind
// ---------------------------------------------------------------------------

/// Which multi-path request variant a list of specs compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiKind {
    Lookup,
    Mutation,
}

impl MultiKind {
    /// The document-level command carrying this request.
    #[must_use]
    pub const fn opcode(self) -> OpCode {
        match self {
            MultiKind::Lookup => OpCode::MultiLookup,
            MultiKind::Mutation => OpCode::MultiMutation,
        }
    }

    /// Whether `opcode` may appear in this variant.
    #[must_use]
    pub const fn permits(self, opcode: SubdocOpcode) -> bool {
        match self {
            MultiKind::Lookup => opcode.is_lookup(),
            MultiKind::Mutation => opcode.is_mutation(),
        }
    }
}

impl fmt::Display for MultiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiKind::Lookup => f.write_str("lookup"),
            MultiKind::Mutation => f.write_str("mutation"),
        }
    }
}
