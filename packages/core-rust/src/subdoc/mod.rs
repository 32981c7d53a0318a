//! Sub-document multi-path requests.
//!
//! - [`spec`]: path specs, verbs and flags
//! - [`compile`](mod@compile): specs -> request body
//! - [`decompile`](mod@decompile): reply body -> per-path results

pub mod compile;
pub mod decompile;
pub mod spec;

pub use compile::{compile, CompileError, MultiRequest, MAX_PATHS};
pub use decompile::{check_overall_status, decompile, DecompileError, PathError, PathResult};
pub use spec::{MultiKind, PathFlags, PathSpec, SubdocOpcode};
