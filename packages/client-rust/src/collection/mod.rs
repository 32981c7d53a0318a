//! Collection verb facade.
//!
//! Each verb builds one [`Operation`], runs it once through the middleware
//! pipeline and unwraps the typed result. Failures come back as [`KvError`]
//! with the classified [`ErrorKind`](kvwire_core::ErrorKind).

pub mod options;
pub mod results;

use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use kvwire_core::{
    check_overall_status, compile, decompile, ErrorKind, MultiKind, OpCode, PathSpec,
};
use tower::ServiceExt;

use crate::config::ClientConfig;
use crate::correlator::{Call, Correlator};
use crate::error::KvError;
use crate::middleware::{build_pipeline, Pipeline};
use crate::operation::{Body, Operation, Request};
use crate::transport::Transport;

pub use options::{encode_expiry, CounterOptions, RequestOptions, StoreOptions, TouchOptions};
pub use results::{
    CounterResult, ExistsResult, GetResult, LookupInResult, MutateInResult, MutationResult,
    MutationToken,
};

/// Counter extras expiry meaning "fail instead of creating the counter".
const COUNTER_NO_CREATE: u32 = 0xffff_ffff;

/// Key-value verbs against one collection.
///
/// Cheap to clone; clones share the pipeline and its load-shedding budget.
#[derive(Debug, Clone)]
pub struct Collection {
    pipeline: Pipeline,
    config: Arc<ClientConfig>,
}

impl Collection {
    /// Builds the correlator and middleware pipeline over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let correlator = Correlator::new(transport, &config);
        Self::with_pipeline(build_pipeline(correlator, &config), config)
    }

    #[must_use]
    pub fn with_pipeline(pipeline: Pipeline, config: ClientConfig) -> Self {
        Self {
            pipeline,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, opcode: OpCode, key: &str) -> Request {
        Request::new(opcode, Bytes::copy_from_slice(key.as_bytes()))
            .with_collection(self.config.collection_id)
    }

    async fn run<T>(&self, op: Operation<T>, options: &RequestOptions) -> Result<T, KvError> {
        let (request, decode) = op.into_parts();
        let call = Call {
            request,
            cancel: options.cancel.clone(),
            timeout: options.timeout,
        };
        let reply = self.pipeline.clone().oneshot(call).await?;
        decode(reply)
    }

    // -- reads ---------------------------------------------------------------

    /// Fetches a whole document.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key does not exist, or any execution failure.
    pub async fn get(&self, key: &str, options: RequestOptions) -> Result<GetResult, KvError> {
        let op = self.request(OpCode::Get, key).decode_with(GetResult::decode);
        self.run(op, &options).await
    }

    /// Checks whether a document exists without fetching it.
    ///
    /// # Errors
    ///
    /// Any execution failure other than `NotFound`.
    pub async fn exists(&self, key: &str, options: RequestOptions) -> Result<ExistsResult, KvError> {
        let op = self
            .request(OpCode::GetMeta, key)
            .decode_with(|reply| Ok(ExistsResult::decode(&reply)));
        match self.run(op, &options).await {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ExistsResult::missing()),
            other => other,
        }
    }

    /// Fetches a document and resets its expiry.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key does not exist, or any execution failure.
    pub async fn get_and_touch(
        &self,
        key: &str,
        expiry: Duration,
        options: TouchOptions,
    ) -> Result<GetResult, KvError> {
        let ttl = encode_expiry(expiry);
        let op = self
            .request(OpCode::GetAndTouch, key)
            .with_durability(options.durability, self.config.durability_timeout)
            .with_expiry(Some(ttl))
            .with_body(move || extras_only(u32_extras(ttl)))
            .decode_with(GetResult::decode);
        self.run(op, &options.request).await
    }

    /// Fetches a document and locks it for `lock_time`; the returned CAS unlocks it.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Locked` if already locked, or any execution failure.
    pub async fn get_and_lock(
        &self,
        key: &str,
        lock_time: Duration,
        options: RequestOptions,
    ) -> Result<GetResult, KvError> {
        let secs = u32::try_from(lock_time.as_secs()).unwrap_or(u32::MAX);
        let op = self
            .request(OpCode::GetAndLock, key)
            .with_body(move || extras_only(u32_extras(secs)))
            .decode_with(GetResult::decode);
        self.run(op, &options).await
    }

    /// Reads one or more paths of a document. Individual paths may fail
    /// while the call as a whole succeeds.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if `specs` do not form a valid lookup (checked before
    /// anything is sent), `Protocol` for a malformed reply, or any execution
    /// failure of the document itself (e.g. `NotFound`).
    pub async fn lookup_in(
        &self,
        key: &str,
        specs: &[PathSpec],
        options: RequestOptions,
    ) -> Result<LookupInResult, KvError> {
        let compiled = compile(MultiKind::Lookup, specs)?;
        let specs = specs.to_vec();
        let op = self
            .request(OpCode::MultiLookup, key)
            .with_body(move || Body {
                extras: Bytes::new(),
                value: compiled.body,
            })
            .decode_with(move |reply| {
                let results = decompile(MultiKind::Lookup, &reply.value, &specs)?;
                check_overall_status(reply.status, &results)?;
                Ok(LookupInResult::new(&reply, results))
            });
        self.run(op, &options).await
    }

    // -- writes --------------------------------------------------------------

    /// Creates or overwrites a document.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` on a CAS mismatch, `Durability` if the requested level
    /// cannot be met, or any execution failure.
    pub async fn upsert(
        &self,
        key: &str,
        value: impl Into<Bytes>,
        options: StoreOptions,
    ) -> Result<MutationResult, KvError> {
        self.store(OpCode::Set, key, value.into(), options).await
    }

    /// Creates a document, failing if it exists. Any CAS in `options` is ignored.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the key exists, or any execution failure.
    pub async fn insert(
        &self,
        key: &str,
        value: impl Into<Bytes>,
        mut options: StoreOptions,
    ) -> Result<MutationResult, KvError> {
        options.cas = None;
        self.store(OpCode::Add, key, value.into(), options).await
    }

    /// Overwrites an existing document.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is missing, `AlreadyExists` on a CAS mismatch,
    /// or any execution failure.
    pub async fn replace(
        &self,
        key: &str,
        value: impl Into<Bytes>,
        options: StoreOptions,
    ) -> Result<MutationResult, KvError> {
        self.store(OpCode::Replace, key, value.into(), options).await
    }

    async fn store(
        &self,
        opcode: OpCode,
        key: &str,
        value: Bytes,
        options: StoreOptions,
    ) -> Result<MutationResult, KvError> {
        let ttl = options.expiry.map_or(0, encode_expiry);
        let flags = options.flags;
        let op = self
            .mutation(opcode, key, &options)
            .with_expiry(options.expiry.map(|_| ttl))
            .with_body(move || {
                let mut extras = BytesMut::with_capacity(8);
                extras.put_u32(flags);
                extras.put_u32(ttl);
                Body {
                    extras: extras.freeze(),
                    value,
                }
            })
            .decode_with(|reply| Ok(MutationResult::decode(&reply)));
        self.run(op, &options.request).await
    }

    /// Deletes a document. Flags and expiry in `options` are ignored.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is missing, `AlreadyExists` on a CAS mismatch,
    /// or any execution failure.
    pub async fn remove(&self, key: &str, options: StoreOptions) -> Result<MutationResult, KvError> {
        let op = self
            .mutation(OpCode::Delete, key, &options)
            .decode_with(|reply| Ok(MutationResult::decode(&reply)));
        self.run(op, &options.request).await
    }

    /// Appends raw bytes to an existing document.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is missing, or any execution failure.
    pub async fn append(
        &self,
        key: &str,
        value: impl Into<Bytes>,
        options: StoreOptions,
    ) -> Result<MutationResult, KvError> {
        self.concat(OpCode::Append, key, value.into(), options).await
    }

    /// Prepends raw bytes to an existing document.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is missing, or any execution failure.
    pub async fn prepend(
        &self,
        key: &str,
        value: impl Into<Bytes>,
        options: StoreOptions,
    ) -> Result<MutationResult, KvError> {
        self.concat(OpCode::Prepend, key, value.into(), options).await
    }

    async fn concat(
        &self,
        opcode: OpCode,
        key: &str,
        value: Bytes,
        options: StoreOptions,
    ) -> Result<MutationResult, KvError> {
        let op = self
            .mutation(opcode, key, &options)
            .with_body(move || Body {
                extras: Bytes::new(),
                value,
            })
            .decode_with(|reply| Ok(MutationResult::decode(&reply)));
        self.run(op, &options.request).await
    }

    /// Resets a document's expiry.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is missing, or any execution failure.
    pub async fn touch(
        &self,
        key: &str,
        expiry: Duration,
        options: TouchOptions,
    ) -> Result<MutationResult, KvError> {
        let ttl = encode_expiry(expiry);
        let op = self
            .request(OpCode::Touch, key)
            .with_durability(options.durability, self.config.durability_timeout)
            .with_expiry(Some(ttl))
            .with_body(move || extras_only(u32_extras(ttl)))
            .decode_with(|reply| Ok(MutationResult::decode(&reply)));
        self.run(op, &options.request).await
    }

    /// Releases a lock taken by [`Collection::get_and_lock`].
    ///
    /// # Errors
    ///
    /// `Locked` or `AlreadyExists` if `cas` does not match the lock, or any
    /// execution failure.
    pub async fn unlock(&self, key: &str, cas: u64, options: RequestOptions) -> Result<(), KvError> {
        let op = self
            .request(OpCode::Unlock, key)
            .with_cas(Some(cas))
            .decode_with(|_| Ok(()));
        self.run(op, &options).await
    }

    /// Adds `options.delta` to a counter document.
    ///
    /// # Errors
    ///
    /// `NotFound` if the counter is missing and no initial value was given,
    /// `InvalidArgument` if the document is not numeric, or any execution failure.
    pub async fn increment(
        &self,
        key: &str,
        options: CounterOptions,
    ) -> Result<CounterResult, KvError> {
        self.counter(OpCode::Increment, key, options).await
    }

    /// Subtracts `options.delta` from a counter document, stopping at zero.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::increment`].
    pub async fn decrement(
        &self,
        key: &str,
        options: CounterOptions,
    ) -> Result<CounterResult, KvError> {
        self.counter(OpCode::Decrement, key, options).await
    }

    async fn counter(
        &self,
        opcode: OpCode,
        key: &str,
        options: CounterOptions,
    ) -> Result<CounterResult, KvError> {
        let expiry = options.initial.and(options.expiry.map(encode_expiry));
        let ttl = match options.initial {
            Some(_) => expiry.unwrap_or(0),
            None => COUNTER_NO_CREATE,
        };
        let (delta, initial) = (options.delta, options.initial.unwrap_or(0));
        let op = self
            .request(opcode, key)
            .with_durability(options.durability, self.config.durability_timeout)
            .with_expiry(expiry)
            .with_body(move || {
                let mut extras = BytesMut::with_capacity(20);
                extras.put_u64(delta);
                extras.put_u64(initial);
                extras.put_u32(ttl);
                extras_only(extras.freeze())
            })
            .decode_with(|reply| CounterResult::decode(&reply));
        self.run(op, &options.request).await
    }

    /// Applies every spec to a document atomically: either all paths are
    /// applied or none is.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if `specs` do not form a valid mutation (checked
    /// before anything is sent), `PathFailure` for the first failed path,
    /// `Protocol` for a malformed reply, or any execution failure.
    pub async fn mutate_in(
        &self,
        key: &str,
        specs: &[PathSpec],
        options: StoreOptions,
    ) -> Result<MutateInResult, KvError> {
        let compiled = compile(MultiKind::Mutation, specs)?;
        let specs = specs.to_vec();
        let ttl = options.expiry.map(encode_expiry);
        let op = self
            .mutation(OpCode::MultiMutation, key, &options)
            .with_expiry(ttl)
            .with_body(move || Body {
                extras: ttl.map(u32_extras).unwrap_or_default(),
                value: compiled.body,
            })
            .decode_with(move |reply| {
                let results = decompile(MultiKind::Mutation, &reply.value, &specs)?;
                check_overall_status(reply.status, &results)?;
                MutateInResult::new(&reply, results)
            });
        self.run(op, &options.request).await
    }

    fn mutation(&self, opcode: OpCode, key: &str, options: &StoreOptions) -> Request {
        self.request(opcode, key)
            .with_cas(options.cas)
            .with_durability(options.durability, self.config.durability_timeout)
    }
}

fn u32_extras(value: u32) -> Bytes {
    Bytes::copy_from_slice(&value.to_be_bytes())
}

fn extras_only(extras: Bytes) -> Body {
    Body {
        extras,
        value: Bytes::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
