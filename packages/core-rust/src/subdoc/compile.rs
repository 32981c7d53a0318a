//! Compiles an ordered list of path specs into one multi-path request body.
//!
//! ```text
//! lookup entry:   opcode(1) flags(1) path_len(2) path
//! mutation entry: opcode(1) flags(1) path_len(2) value_len(4) path value
//! ```
//!
//! All integers are big-endian. Entries appear in input order.

use bytes::{BufMut, Bytes, BytesMut};

use super::spec::{MultiKind, PathSpec, SubdocOpcode};

/// Maximum number of paths the server accepts in one request.
pub const MAX_PATHS: usize = 16;

const LOOKUP_ENTRY_HEADER: usize = 4;
const MUTATION_ENTRY_HEADER: usize = 8;

/// Reasons a list of specs cannot become a request. Raised before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("a multi-path request needs at least one path")]
    Empty,
    #[error("{count} paths exceed the maximum of {max} per request")]
    TooManyPaths { count: usize, max: usize },
    #[error("path {index}: {opcode} is not permitted in a {kind} request")]
    VerbNotAllowed {
        index: usize,
        opcode: SubdocOpcode,
        kind: MultiKind,
    },
    #[error("path {index}: {opcode} requires a value")]
    MissingValue { index: usize, opcode: SubdocOpcode },
    #[error("path {index}: {opcode} does not take a value")]
    UnexpectedValue { index: usize, opcode: SubdocOpcode },
    #[error("path {index}: path of {len} bytes exceeds the wire limit")]
    PathTooLong { index: usize, len: usize },
    #[error("path {index}: value of {len} bytes exceeds the wire limit")]
    ValueTooLong { index: usize, len: usize },
}

/// Wire-level body of a multi-path request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiRequest {
    pub kind: MultiKind,
    /// Number of path entries in `body`.
    pub count: usize,
    pub body: Bytes,
}

/// Compiles `specs` into a request of the given kind.
///
/// # Errors
///
/// Returns a `CompileError` if `specs` is empty, longer than [`MAX_PATHS`],
/// mixes verbs not permitted for `kind`, has a value missing or present where
/// the verb says otherwise, or has a path or value too long for its length
/// field.
pub fn compile(kind: MultiKind, specs: &[PathSpec]) -> Result<MultiRequest, CompileError> {
    if specs.is_empty() {
        return Err(CompileError::Empty);
    }
    if specs.len() > MAX_PATHS {
        return Err(CompileError::TooManyPaths {
            count: specs.len(),
            max: MAX_PATHS,
        });
    }

    let mut size = 0;
    for (index, spec) in specs.iter().enumerate() {
        validate(kind, index, spec)?;
        size += match kind {
            MultiKind::Lookup => LOOKUP_ENTRY_HEADER + spec.path.len(),
            MultiKind::Mutation => {
                MUTATION_ENTRY_HEADER
                    + spec.path.len()
                    + spec.value.as_ref().map_or(0, Bytes::len)
            }
        };
    }

    let mut buf = BytesMut::with_capacity(size);
    for spec in specs {
        buf.put_u8(spec.opcode.code());
        buf.put_u8(spec.flags.bits());
        // Lengths were range-checked by `validate`.
        #[allow(clippy::cast_possible_truncation)]
        buf.put_u16(spec.path.len() as u16);
        if kind == MultiKind::Mutation {
            let value = spec.value.as_deref().unwrap_or_default();
            #[allow(clippy::cast_possible_truncation)]
            buf.put_u32(value.len() as u32);
            buf.put_slice(spec.path.as_bytes());
            buf.put_slice(value);
        } else {
            buf.put_slice(spec.path.as_bytes());
        }
    }

    tracing::trace!(%kind, count = specs.len(), bytes = buf.len(), "compiled multi-path request");

    Ok(MultiRequest {
        kind,
        count: specs.len(),
        body: buf.freeze(),
    })
}

fn validate(kind: MultiKind, index: usize, spec: &PathSpec) -> Result<(), CompileError> {
    let opcode = spec.opcode;
    if !kind.permits(opcode) {
        return Err(CompileError::VerbNotAllowed {
            index,
            opcode,
            kind,
        });
    }
    match (&spec.value, opcode.takes_value()) {
        (None, true) => return Err(CompileError::MissingValue { index, opcode }),
        (Some(_), false) => return Err(CompileError::UnexpectedValue { index, opcode }),
        _ => {}
    }
    if spec.path.len() > usize::from(u16::MAX) {
        return Err(CompileError::PathTooLong {
            index,
            len: spec.path.len(),
        });
    }
    if let Some(value) = &spec.value {
        if u32::try_from(value.len()).is_err() {
            return Err(CompileError::ValueTooLong {
                index,
                len: value.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_layout() {
        let req = compile(
            MultiKind::Lookup,
            &[PathSpec::get("name"), PathSpec::exists("tags").xattr()],
        )
        .unwrap();

        assert_eq!(req.count, 2);
        assert_eq!(
            req.body.as_ref(),
            &[
                0xc5, 0x00, 0x00, 0x04, b'n', b'a', b'm', b'e', //
                0xc6, 0x04, 0x00, 0x04, b't', b'a', b'g', b's',
            ]
        );
    }

    #[test]
    fn mutation_layout() {
        let req = compile(
            MultiKind::Mutation,
            &[PathSpec::upsert("a", "1"), PathSpec::remove("b")],
        )
        .unwrap();

        assert_eq!(
            req.body.as_ref(),
            &[
                0xc8, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, b'a', b'1', //
                0xc9, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, b'b',
            ]
        );
    }

    #[test]
    fn preserves_order_and_duplicate_paths() {
        let req = compile(
            MultiKind::Lookup,
            &[PathSpec::get("x"), PathSpec::exists("x"), PathSpec::get("x")],
        )
        .unwrap();
        let opcodes: Vec<u8> = req.body.chunks(5).map(|c| c[0]).collect();
        assert_eq!(opcodes, vec![0xc5, 0xc6, 0xc5]);
    }

    #[test]
    fn rejects_read_verb_in_mutation() {
        let err = compile(
            MultiKind::Mutation,
            &[PathSpec::upsert("a", "1"), PathSpec::get("b")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::VerbNotAllowed {
                index: 1,
                opcode: SubdocOpcode::Get,
                kind: MultiKind::Mutation,
            }
        );
    }

    #[test]
    fn rejects_write_verb_in_lookup() {
        let err = compile(MultiKind::Lookup, &[PathSpec::remove("a")]).unwrap_err();
        assert!(matches!(err, CompileError::VerbNotAllowed { index: 0, .. }));
    }

    #[test]
    fn rejects_empty_and_oversized_requests() {
        assert_eq!(compile(MultiKind::Lookup, &[]), Err(CompileError::Empty));

        let specs: Vec<_> = (0..=MAX_PATHS).map(|i| PathSpec::get(format!("p{i}"))).collect();
        assert_eq!(
            compile(MultiKind::Lookup, &specs),
            Err(CompileError::TooManyPaths {
                count: MAX_PATHS + 1,
                max: MAX_PATHS,
            })
        );
        assert!(compile(MultiKind::Lookup, &specs[..MAX_PATHS]).is_ok());
    }

    #[test]
    fn rejects_value_mismatch() {
        let mut spec = PathSpec::upsert("a", "1");
        spec.value = None;
        assert!(matches!(
            compile(MultiKind::Mutation, &[spec]),
            Err(CompileError::MissingValue { index: 0, .. })
        ));

        let mut spec = PathSpec::get("a");
        spec.value = Some(Bytes::from_static(b"1"));
        assert!(matches!(
            compile(MultiKind::Lookup, &[spec]),
            Err(CompileError::UnexpectedValue { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_path_longer_than_length_field() {
        let long = "a".repeat(usize::from(u16::MAX) + 1);
        let err = compile(MultiKind::Lookup, &[PathSpec::get(long)]).unwrap_err();
        assert!(matches!(err, CompileError::PathTooLong { index: 0, .. }));
    }
}
