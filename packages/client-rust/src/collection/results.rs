//! Typed results returned by the collection verbs, and the reply decoders
//! that build them.

use bytes::{Buf, Bytes};
use kvwire_core::{PathResult, Status};

use crate::error::KvError;
use crate::operation::ReplyEnvelope;

/// Server-assigned position of a mutation in its partition's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationToken {
    pub partition_uuid: u64,
    pub sequence_number: u64,
}

impl MutationToken {
    /// Reads the token from mutation reply extras, if the server sent one.
    fn from_extras(extras: &Bytes) -> Option<Self> {
        if extras.len() < 16 {
            return None;
        }
        let mut buf = extras.clone();
        Some(Self {
            partition_uuid: buf.get_u64(),
            sequence_number: buf.get_u64(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResult {
    pub cas: u64,
    pub flags: u32,
    pub content: Bytes,
}

impl GetResult {
    pub(crate) fn decode(reply: ReplyEnvelope) -> Result<Self, KvError> {
        let flags = match reply.extras.len() {
            0 => 0,
            n if n >= 4 => reply.extras.clone().get_u32(),
            n => return Err(KvError::decode(format!("get extras: expected 4 bytes, got {n}"))),
        };
        Ok(Self {
            cas: reply.cas,
            flags,
            content: reply.value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistsResult {
    pub exists: bool,
    pub cas: u64,
}

impl ExistsResult {
    /// A tombstone (deleted flag set in the meta extras) does not exist.
    pub(crate) fn decode(reply: &ReplyEnvelope) -> Self {
        let deleted = reply.extras.len() >= 4 && reply.extras.clone().get_u32() != 0;
        Self {
            exists: !deleted,
            cas: reply.cas,
        }
    }

    pub(crate) const fn missing() -> Self {
        Self {
            exists: false,
            cas: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationResult {
    pub cas: u64,
    pub token: Option<MutationToken>,
}

impl MutationResult {
    pub(crate) fn decode(reply: &ReplyEnvelope) -> Self {
        Self {
            cas: reply.cas,
            token: MutationToken::from_extras(&reply.extras),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterResult {
    pub cas: u64,
    pub content: u64,
    pub token: Option<MutationToken>,
}

impl CounterResult {
    pub(crate) fn decode(reply: &ReplyEnvelope) -> Result<Self, KvError> {
        let Ok(raw) = <[u8; 8]>::try_from(reply.value.as_ref()) else {
            return Err(KvError::decode(format!(
                "counter value: expected 8 bytes, got {}",
                reply.value.len()
            )));
        };
        Ok(Self {
            cas: reply.cas,
            content: u64::from_be_bytes(raw),
            token: MutationToken::from_extras(&reply.extras),
        })
    }
}

/// Per-path results of a lookup; individual paths may have failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupInResult {
    pub cas: u64,
    /// True when the document is a tombstone (`SubDocMultiPathFailureDeleted`
    /// or `SubDocSuccessDeleted`).
    pub deleted: bool,
    pub results: Vec<PathResult>,
}

impl LookupInResult {
    pub(crate) fn new(reply: &ReplyEnvelope, results: Vec<PathResult>) -> Self {
        Self {
            cas: reply.cas,
            deleted: is_deleted(reply.status),
            results,
        }
    }

    /// Content at `index`, or the path's failure.
    ///
    /// # Errors
    ///
    /// Returns `KvError::PathFailure` if that path failed, or
    /// `KvError::Decode` if `index` is out of range.
    pub fn content(&self, index: usize) -> Result<&Bytes, KvError> {
        path_content(&self.results, index)
    }

    /// Whether the path at `index` was found.
    #[must_use]
    pub fn exists(&self, index: usize) -> bool {
        self.results.get(index).is_some_and(PathResult::is_success)
    }
}

/// Per-path results of an atomic mutation; every path succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateInResult {
    pub cas: u64,
    pub token: Option<MutationToken>,
    pub results: Vec<PathResult>,
}

impl MutateInResult {
    /// Fails with the first failed path, since the mutation was not applied.
    pub(crate) fn new(reply: &ReplyEnvelope, results: Vec<PathResult>) -> Result<Self, KvError> {
        if let Some(failed) = results.iter().find(|r| !r.is_success()) {
            return Err(path_failure(failed));
        }
        Ok(Self {
            cas: reply.cas,
            token: MutationToken::from_extras(&reply.extras),
            results,
        })
    }

    /// Value produced by the path at `index` (counters produce the new value,
    /// other mutations an empty value).
    ///
    /// # Errors
    ///
    /// Returns `KvError::Decode` if `index` is out of range.
    pub fn content(&self, index: usize) -> Result<&Bytes, KvError> {
        path_content(&self.results, index)
    }
}

fn is_deleted(status: Status) -> bool {
    matches!(
        status,
        Status::SubDocSuccessDeleted | Status::SubDocMultiPathFailureDeleted
    )
}

fn path_failure(result: &PathResult) -> KvError {
    match &result.outcome {
        Err(err) => KvError::PathFailure {
            index: result.index,
            path: result.path.clone(),
            kind: err.kind,
            status: err.status,
        },
        Ok(_) => KvError::decode(format!("path {} did not fail", result.index)),
    }
}

fn path_content(results: &[PathResult], index: usize) -> Result<&Bytes, KvError> {
    let Some(result) = results.get(index) else {
        return Err(KvError::decode(format!(
            "path index {index} out of range for {} results",
            results.len()
        )));
    };
    match &result.outcome {
        Ok(value) => Ok(value),
        Err(_) => Err(path_failure(result)),
    }
}
