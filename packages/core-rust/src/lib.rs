//! `kvwire` Core — status codes, error classification, and the sub-document spec compiler.

pub mod classify;
pub mod error_kind;
pub mod error_map;
pub mod opcode;
pub mod status;
pub mod subdoc;

pub use classify::{classify, disposition, Disposition};
pub use error_kind::ErrorKind;
pub use error_map::{ErrorMap, ErrorMapEntry, ErrorMapError};
pub use opcode::{DurabilityLevel, OpCode};
pub use status::{Status, StatusError};
pub use subdoc::{
    check_overall_status, compile, decompile, CompileError, DecompileError, MultiKind,
    MultiRequest, PathError, PathFlags, PathResult, PathSpec, SubdocOpcode, MAX_PATHS,
};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
