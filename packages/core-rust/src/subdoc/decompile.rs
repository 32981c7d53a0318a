//! Parses a multi-path reply body into one result per requested path.
//!
//! ```text
//! lookup entry:   status(2) value_len(4) value             one per path, in order
//! mutation entry: index(1) status(2) [value_len(4) value]  sparse; value only on success
//! ```

use bytes::{Buf, Bytes};

use super::spec::{MultiKind, PathSpec, SubdocOpcode};
use crate::classify::classify;
use crate::error_kind::ErrorKind;
use crate::status::Status;

/// A reply that does not match the request it answers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecompileError {
    #[error("reply has {actual} entries for {expected} requested paths")]
    TooFewEntries { expected: usize, actual: usize },
    #[error("reply has trailing data after {expected} entries")]
    TooManyEntries { expected: usize },
    #[error("entry {index} truncated: needs {needed} bytes, {remaining} remain")]
    Truncated {
        index: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("entry {index} has unknown status 0x{code:04x}")]
    UnknownStatus { index: usize, code: u16 },
    #[error("entry refers to path {index} but only {count} were requested")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("path {index} reported more than once")]
    DuplicateIndex { index: usize },
    #[error("reply status {status} reports a failed path but no entry failed")]
    MissingFailure { status: Status },
}

/// Failure of a single path. Sibling paths are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathError {
    pub kind: ErrorKind,
    pub status: Status,
}

/// Result for one requested path, at the same position as its spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    pub index: usize,
    pub opcode: SubdocOpcode,
    pub path: String,
    pub outcome: Result<Bytes, PathError>,
}

impl PathResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The fragment returned for this path, if it succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&Bytes> {
        self.outcome.as_ref().ok()
    }

    #[must_use]
    pub fn error(&self) -> Option<PathError> {
        self.outcome.as_ref().err().copied()
    }
}

/// Decodes `reply` against the specs it answers.
///
/// # Errors
///
/// Returns a `DecompileError` when the reply is truncated, carries a status
/// outside the protocol enumeration, or reports a different number of paths
/// than were requested. A shorter result list is never returned.
pub fn decompile(
    kind: MultiKind,
    reply: &Bytes,
    specs: &[PathSpec],
) -> Result<Vec<PathResult>, DecompileError> {
    let outcomes = match kind {
        MultiKind::Lookup => decode_lookup(reply.clone(), specs.len())?,
        MultiKind::Mutation => decode_mutation(reply.clone(), specs.len())?,
    };
    Ok(specs
        .iter()
        .zip(outcomes)
        .enumerate()
        .map(|(index, (spec, outcome))| PathResult {
            index,
            opcode: spec.opcode,
            path: spec.path.clone(),
            outcome,
        })
        .collect())
}

/// Checks decoded results against the reply's overall status: a
/// multi-path-failure status must come with at least one failed path.
///
/// # Errors
///
/// Returns `DecompileError::MissingFailure` when the server reported a
/// failure that none of the entries carries.
pub fn check_overall_status(status: Status, results: &[PathResult]) -> Result<(), DecompileError> {
    if status.is_multi_path_failure() && results.iter().all(PathResult::is_success) {
        return Err(DecompileError::MissingFailure { status });
    }
    Ok(())
}

fn decode_lookup(
    mut buf: Bytes,
    expected: usize,
) -> Result<Vec<Result<Bytes, PathError>>, DecompileError> {
    let mut outcomes = Vec::with_capacity(expected);
    for index in 0..expected {
        if !buf.has_remaining() {
            return Err(DecompileError::TooFewEntries {
                expected,
                actual: index,
            });
        }
        ensure(&buf, index, 6)?;
        let code = buf.get_u16();
        let len = buf.get_u32() as usize;
        ensure(&buf, index, len)?;
        let value = buf.split_to(len);
        outcomes.push(path_outcome(index, code, value)?);
    }
    if buf.has_remaining() {
        return Err(DecompileError::TooManyEntries { expected });
    }
    Ok(outcomes)
}

fn decode_mutation(
    mut buf: Bytes,
    expected: usize,
) -> Result<Vec<Result<Bytes, PathError>>, DecompileError> {
    // Paths without an entry succeeded and produced no value.
    let mut outcomes: Vec<Result<Bytes, PathError>> = vec![Ok(Bytes::new()); expected];
    let mut seen = vec![false; expected];
    let mut entry = 0;
    while buf.has_remaining() {
        ensure(&buf, entry, 3)?;
        let index = usize::from(buf.get_u8());
        let code = buf.get_u16();
        if index >= expected {
            return Err(DecompileError::IndexOutOfRange {
                index,
                count: expected,
            });
        }
        if std::mem::replace(&mut seen[index], true) {
            return Err(DecompileError::DuplicateIndex { index });
        }
        let value = if code == Status::Success.code() {
            ensure(&buf, entry, 4)?;
            let len = buf.get_u32() as usize;
            ensure(&buf, entry, len)?;
            buf.split_to(len)
        } else {
            Bytes::new()
        };
        outcomes[index] = path_outcome(index, code, value)?;
        entry += 1;
    }
    Ok(outcomes)
}

fn ensure(buf: &Bytes, index: usize, needed: usize) -> Result<(), DecompileError> {
    if buf.remaining() < needed {
        return Err(DecompileError::Truncated {
            index,
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn path_outcome(index: usize, code: u16, value: Bytes) -> Result<Result<Bytes, PathError>, DecompileError> {
    let status =
        Status::try_from(code).map_err(|_| DecompileError::UnknownStatus { index, code })?;
    if status.is_success() {
        Ok(Ok(value))
    } else {
        Ok(Err(PathError {
            kind: classify(status, None),
            status,
        }))
    }
}
