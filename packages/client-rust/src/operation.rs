//! Operation types carried through the execution core.
//!
//! An [`Operation`] pairs the transport-facing [`Request`] with the decode
//! step that turns an accepted [`ReplyEnvelope`] into the caller's result.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use kvwire_core::{DurabilityLevel, ErrorMapEntry, OpCode, Status};

use crate::error::KvError;

/// Encoded body of a request: protocol extras followed by the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub extras: Bytes,
    pub value: Bytes,
}

/// Produces the request body on demand.
pub type BodyFn = Box<dyn FnOnce() -> Body + Send>;

/// Decodes an accepted reply into a typed result.
pub type DecodeFn<T> = Box<dyn FnOnce(ReplyEnvelope) -> Result<T, KvError> + Send>;

/// Synchronous durability requirement passed through with a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurabilityRequirement {
    pub level: DurabilityLevel,
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// The transport-facing half of an operation.
///
/// `opaque` is the correlation token; the correlator assigns it just before
/// submission and the transport uses it to route the reply back.
pub struct Request {
    pub opaque: u32,
    pub opcode: OpCode,
    pub key: Bytes,
    pub collection_id: Option<u32>,
    pub cas: Option<u64>,
    pub expiry: Option<u32>,
    pub durability: Option<DurabilityRequirement>,
    body: Option<BodyFn>,
}

impl Request {
    #[must_use]
    pub fn new(opcode: OpCode, key: impl Into<Bytes>) -> Self {
        Self {
            opaque: 0,
            opcode,
            key: key.into(),
            collection_id: None,
            cas: None,
            expiry: None,
            durability: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_collection(mut self, collection_id: Option<u32>) -> Self {
        self.collection_id = collection_id;
        self
    }

    /// Sets the compare-and-swap token; zero means "no CAS check".
    #[must_use]
    pub fn with_cas(mut self, cas: Option<u64>) -> Self {
        self.cas = cas.filter(|c| *c != 0);
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expiry: Option<u32>) -> Self {
        self.expiry = expiry;
        self
    }

    /// Requests a durability level; `DurabilityLevel::None` leaves the request untouched.
    #[must_use]
    pub fn with_durability(mut self, level: DurabilityLevel, timeout: Duration) -> Self {
        self.durability = level
            .is_requested()
            .then_some(DurabilityRequirement { level, timeout });
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl FnOnce() -> Body + Send + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Attaches the decode step, producing a complete operation.
    #[must_use]
    pub fn decode_with<T>(
        self,
        decode: impl FnOnce(ReplyEnvelope) -> Result<T, KvError> + Send + 'static,
    ) -> Operation<T> {
        Operation {
            request: self,
            decode: Box::new(decode),
        }
    }

    /// Produces the encoded body. The body producer runs at most once; later
    /// calls return an empty body.
    pub fn take_body(&mut self) -> Body {
        self.body.take().map(|produce| produce()).unwrap_or_default()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("opaque", &self.opaque)
            .field("opcode", &self.opcode)
            .field("key_len", &self.key.len())
            .field("collection_id", &self.collection_id)
            .field("cas", &self.cas)
            .field("expiry", &self.expiry)
            .field("durability", &self.durability)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One logical request plus the step that decodes its reply.
///
/// Consumed exactly once by the correlator.
pub struct Operation<T> {
    request: Request,
    decode: DecodeFn<T>,
}

impl<T> Operation<T> {
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Splits the operation into its transport-facing request and its decode step.
    #[must_use]
    pub fn into_parts(self) -> (Request, DecodeFn<T>) {
        (self.request, self.decode)
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ReplyEnvelope
// ---------------------------------------------------------------------------

/// A decoded reply frame as handed back by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub opaque: u32,
    pub status: Status,
    pub cas: u64,
    pub extras: Bytes,
    pub value: Bytes,
    pub error_map: Option<ErrorMapEntry>,
}

impl ReplyEnvelope {
    #[must_use]
    pub fn new(opaque: u32, status: Status) -> Self {
        Self {
            opaque,
            status,
            cas: 0,
            extras: Bytes::new(),
            value: Bytes::new(),
            error_map: None,
        }
    }

    #[must_use]
    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    #[must_use]
    pub fn with_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = extras.into();
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn with_error_map(mut self, entry: ErrorMapEntry) -> Self {
        self.error_map = Some(entry);
        self
    }
}
