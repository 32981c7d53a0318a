//! `kvwire` Client — asynchronous execution core for the key-value binary protocol.
//!
//! A [`Collection`] turns verbs into [`Operation`]s and runs them through a
//! tower pipeline ending in the [`Correlator`], which submits each request to
//! a [`Transport`] and waits for the matching reply, the deadline, or the
//! caller's cancellation, whichever comes first.

pub mod collection;
pub mod config;
pub mod correlator;
pub mod deadline;
pub mod error;
pub mod middleware;
pub mod operation;
pub mod slot;
pub mod telemetry;
pub mod transport;

pub use collection::{
    Collection, CounterOptions, CounterResult, ExistsResult, GetResult, LookupInResult,
    MutateInResult, MutationResult, MutationToken, RequestOptions, StoreOptions, TouchOptions,
};
pub use config::{ChannelTransportConfig, ClientConfig};
pub use correlator::{Call, Correlator, ExecutionState};
pub use deadline::{Interrupt, DEFAULT_TIMEOUT};
pub use error::{KvError, TransportError};
pub use middleware::{build_pipeline, Pipeline};
pub use operation::{Body, DurabilityRequirement, Operation, ReplyEnvelope, Request};
pub use slot::{ReplySlot, SlotError, SlotOutcome};
pub use telemetry::{init_tracing, LogFormat};
pub use transport::{ChannelTransport, InFlightRequests, Transport};

pub use kvwire_core::{DurabilityLevel, ErrorKind, OpCode, PathSpec, Status};
