//! Operation correlator: drives one operation from submission to resolution.
//!
//! Each call gets a fresh correlation token and [`ReplySlot`]. The transport
//! hand-off and the wait on the slot run inside one deadline-aware race; when
//! the deadline or the caller's token interrupts the wait, the correlator
//! tries to resolve the slot with the matching outcome and then reports
//! whichever outcome actually won the slot.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use kvwire_core::classify;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::deadline::{effective_timeout, race, Interrupt};
use crate::error::{KvError, TransportError};
use crate::operation::{Operation, ReplyEnvelope, Request};
use crate::slot::{ReplySlot, SlotOutcome};
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// ExecutionState
// ---------------------------------------------------------------------------

/// Lifecycle of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Built,
    Submitted,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Completed
                | ExecutionState::Failed
                | ExecutionState::TimedOut
                | ExecutionState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: ExecutionState) -> bool {
        match self {
            ExecutionState::Built => matches!(next, ExecutionState::Submitted),
            ExecutionState::Submitted => next.is_terminal(),
            _ => false,
        }
    }

    fn advance(&mut self, next: ExecutionState) {
        debug_assert!(
            self.can_advance_to(next),
            "illegal transition {self:?} -> {next:?}"
        );
        *self = next;
    }
}

// ---------------------------------------------------------------------------
// Correlator
// ---------------------------------------------------------------------------

struct CorrelatorInner {
    transport: Arc<dyn Transport>,
    default_timeout: Duration,
    next_opaque: AtomicU32,
}

/// Executes operations against a shared transport, one attempt per call.
///
/// Cheap to clone; clones share the transport and the opaque counter.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<CorrelatorInner>,
}

/// Releases the transport's routing state for one opaque when dropped.
struct Registration<'a> {
    transport: &'a dyn Transport,
    opaque: u32,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.transport.release(self.opaque);
    }
}

impl Correlator {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(CorrelatorInner {
                transport,
                default_timeout: config.default_timeout,
                next_opaque: AtomicU32::new(1),
            }),
        }
    }

    /// Next correlation token. Wraps around, skipping zero.
    fn next_opaque(&self) -> u32 {
        loop {
            let opaque = self.inner.next_opaque.fetch_add(1, Ordering::Relaxed);
            if opaque != 0 {
                return opaque;
            }
        }
    }

    /// Executes `op` once and decodes its reply.
    ///
    /// `timeout` falls back to the configured default when `None` or zero.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Status` for a non-success reply, `KvError::Timeout`
    /// when the deadline elapsed first, `KvError::Cancelled` when `cancel`
    /// fired first, `KvError::Transport` when the transport failed the request,
    /// or whatever the operation's decode step reports.
    pub async fn execute<T>(
        &self,
        op: Operation<T>,
        cancel: Option<&CancellationToken>,
        timeout: Option<Duration>,
    ) -> Result<T, KvError> {
        let (request, decode) = op.into_parts();
        let reply = self.dispatch(request, cancel, timeout).await?;
        decode(reply)
    }

    /// Submits `request` and waits for an accepted reply envelope.
    ///
    /// A reply is accepted when its status is one the request's opcode can
    /// decode; any other status is classified into a `KvError::Status`.
    ///
    /// # Errors
    ///
    /// Same as [`Correlator::execute`], minus decode errors.
    pub async fn dispatch(
        &self,
        mut request: Request,
        cancel: Option<&CancellationToken>,
        timeout: Option<Duration>,
    ) -> Result<ReplyEnvelope, KvError> {
        let timeout = effective_timeout(timeout, self.inner.default_timeout);
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = timeout.as_millis() as u64;
        let opaque = self.next_opaque();
        request.opaque = opaque;
        let opcode = request.opcode;

        let mut state = ExecutionState::Built;
        let (slot, mut outcome_rx) = ReplySlot::new(opaque);
        let transport = &*self.inner.transport;
        let _registration = Registration { transport, opaque };

        debug!(%opcode, opaque, key_len = request.key.len(), timeout_ms, "executing operation");
        state.advance(ExecutionState::Submitted);

        let wait = async {
            if let Err(err) = transport.send(request, slot.clone()).await {
                warn!(%opcode, opaque, error = %err, "transport rejected operation");
                let _ = slot.fail(err);
            }
            (&mut outcome_rx).await
        };
        let raced = race(wait, cancel, timeout).await;

        let received = match raced {
            Ok(received) => received,
            Err(interrupt) => {
                let outcome = match interrupt {
                    Interrupt::DeadlineElapsed => SlotOutcome::TimedOut,
                    Interrupt::Cancelled => SlotOutcome::Cancelled,
                };
                if slot.resolve(outcome).is_err() {
                    debug!(%opcode, opaque, ?interrupt, "reply won the race against interrupt");
                }
                outcome_rx.await
            }
        };
        // The sender lives in `slot`, which is still alive here.
        let outcome = received.map_err(|_| KvError::Transport(TransportError::Disconnected))?;

        let result = match outcome {
            SlotOutcome::Delivered(reply) if opcode.accepts(reply.status) => {
                state.advance(ExecutionState::Completed);
                Ok(reply)
            }
            SlotOutcome::Delivered(reply) => {
                state.advance(ExecutionState::Failed);
                let kind = classify(reply.status, reply.error_map.as_ref());
                Err(KvError::Status {
                    kind,
                    status: reply.status,
                    opcode,
                    error_map: reply.error_map,
                })
            }
            SlotOutcome::Failed(err) => {
                state.advance(ExecutionState::Failed);
                Err(KvError::Transport(err))
            }
            SlotOutcome::TimedOut => {
                state.advance(ExecutionState::TimedOut);
                warn!(%opcode, opaque, timeout_ms, "operation timed out");
                Err(KvError::Timeout { timeout_ms })
            }
            SlotOutcome::Cancelled => {
                state.advance(ExecutionState::Cancelled);
                Err(KvError::Cancelled)
            }
        };

        debug!(%opcode, opaque, ?state, "operation resolved");
        result
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("default_timeout", &self.inner.default_timeout)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// tower::Service
// ---------------------------------------------------------------------------

/// One execution request as seen by the middleware pipeline.
#[derive(Debug)]
pub struct Call {
    pub request: Request,
    pub cancel: Option<CancellationToken>,
    pub timeout: Option<Duration>,
}

impl Call {
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            cancel: None,
            timeout: None,
        }
    }
}

impl Service<Call> for Correlator {
    type Response = ReplyEnvelope;
    type Error = KvError;
    type Future = Pin<Box<dyn Future<Output = Result<ReplyEnvelope, KvError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call) -> Self::Future {
        let correlator = self.clone();
        Box::pin(async move {
            correlator
                .dispatch(call.request, call.cancel.as_ref(), call.timeout)
                .await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes};
    use kvwire_core::{
        compile, decompile, ErrorKind, ErrorMapEntry, MultiKind, OpCode, PathSpec, Status,
    };
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ChannelTransportConfig;
    use crate::operation::Body;
    use crate::transport::ChannelTransport;

    fn setup() -> (Correlator, Arc<ChannelTransport>, mpsc::Receiver<Request>) {
        let (transport, rx) = ChannelTransport::new(&ChannelTransportConfig::default());
        let transport = Arc::new(transport);
        let correlator = Correlator::new(transport.clone(), &ClientConfig::default());
        (correlator, transport, rx)
    }

    fn get_op() -> Operation<Bytes> {
        Request::new(OpCode::Get, "doc").decode_with(|reply| Ok(reply.value))
    }

    /// Answers every request with `status` and `value`.
    fn respond_with(
        transport: Arc<ChannelTransport>,
        mut rx: mpsc::Receiver<Request>,
        status: Status,
        value: &'static [u8],
    ) {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                transport.deliver(
                    ReplyEnvelope::new(request.opaque, status)
                        .with_cas(77)
                        .with_value(value),
                );
            }
        });
    }

    #[tokio::test]
    async fn success_reply_is_decoded() {
        let (correlator, transport, rx) = setup();
        respond_with(transport.clone(), rx, Status::Success, b"{\"a\":1}");

        let value = correlator.execute(get_op(), None, None).await.unwrap();
        assert_eq!(value.as_ref(), b"{\"a\":1}");
        assert_eq!(transport.in_flight(), 0);
    }

    #[tokio::test]
    async fn body_closure_reaches_the_transport() {
        let (correlator, transport, mut rx) = setup();
        let op = Request::new(OpCode::Set, "doc")
            .with_body(|| Body {
                extras: Bytes::from_static(&[0; 8]),
                value: Bytes::from_static(b"v"),
            })
            .decode_with(|reply| Ok(reply.cas));

        let server = tokio::spawn(async move {
            let mut request = rx.recv().await.unwrap();
            let body = request.take_body();
            assert_eq!(body.value.as_ref(), b"v");
            assert_eq!(body.extras.len(), 8);
            transport.deliver(ReplyEnvelope::new(request.opaque, Status::Success).with_cas(5));
        });

        assert_eq!(correlator.execute(op, None, None).await.unwrap(), 5);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn failure_status_is_classified_with_error_map() {
        let (correlator, transport, mut rx) = setup();
        let entry = ErrorMapEntry {
            name: "KEY_ENOENT".to_string(),
            description: "Not Found".to_string(),
            attributes: vec!["item-only".to_string()],
        };
        let reply_entry = entry.clone();
        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            transport.deliver(
                ReplyEnvelope::new(request.opaque, Status::KeyNotFound).with_error_map(reply_entry),
            );
        });

        let err = correlator.execute(get_op(), None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        match err {
            KvError::Status {
                status,
                opcode,
                error_map,
                ..
            } => {
                assert_eq!(status, Status::KeyNotFound);
                assert_eq!(opcode, OpCode::Get);
                assert_eq!(error_map, Some(entry));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_applies_when_none_given() {
        let (correlator, transport, _rx) = setup();
        let start = tokio::time::Instant::now();

        let err = correlator.execute(get_op(), None, None).await.unwrap_err();

        assert!(matches!(err, KvError::Timeout { timeout_ms: 2500 }));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2500));
        assert!(elapsed < Duration::from_millis(2600));
        assert_eq!(transport.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_token_alone_still_gets_the_default_deadline() {
        let (correlator, transport, _rx) = setup();
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();

        let err = correlator
            .execute(get_op(), Some(&token), None)
            .await
            .unwrap_err();

        assert!(matches!(err, KvError::Timeout { timeout_ms: 2500 }));
        assert!(!token.is_cancelled());
        assert!(start.elapsed() >= Duration::from_millis(2500));
        assert!(start.elapsed() < Duration::from_millis(2600));
        assert_eq!(transport.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_means_default() {
        let (correlator, _transport, _rx) = setup();
        let err = correlator
            .execute(get_op(), None, Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::Timeout { timeout_ms: 2500 }));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_firing_first_is_reported_as_timeout() {
        let (correlator, _transport, _rx) = setup();
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = correlator
            .execute(get_op(), Some(&token), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_firing_first_is_reported_as_cancelled() {
        let (correlator, _transport, _rx) = setup();
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = correlator
            .execute(get_op(), Some(&token), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::Cancelled));
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn late_delivery_after_timeout_is_a_no_op() {
        let (correlator, transport, mut rx) = setup();

        let err = correlator
            .execute(get_op(), None, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let stale = rx.recv().await.unwrap();
        assert!(!transport.deliver(ReplyEnvelope::new(stale.opaque, Status::Success)));

        // The next call gets its own reply, not the stale one.
        let server_transport = transport.clone();
        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            assert_ne!(request.opaque, stale.opaque);
            server_transport.deliver(
                ReplyEnvelope::new(stale.opaque, Status::Success).with_value("stale"),
            );
            server_transport.deliver(
                ReplyEnvelope::new(request.opaque, Status::Success).with_value("fresh"),
            );
        });
        let value = correlator.execute(get_op(), None, None).await.unwrap();
        assert_eq!(value.as_ref(), b"fresh");
    }

    #[tokio::test]
    async fn cancelling_after_resolution_is_harmless() {
        let (correlator, transport, rx) = setup();
        respond_with(transport, rx, Status::Success, b"x");
        let token = CancellationToken::new();

        let value = correlator.execute(get_op(), Some(&token), None).await.unwrap();
        token.cancel();
        assert_eq!(value.as_ref(), b"x");
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced() {
        let (correlator, _transport, rx) = setup();
        drop(rx);

        let err = correlator.execute(get_op(), None, None).await.unwrap_err();
        assert!(matches!(
            err,
            KvError::Transport(TransportError::Disconnected)
        ));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn decode_failure_is_a_protocol_error() {
        let (correlator, transport, rx) = setup();
        respond_with(transport, rx, Status::Success, b"abc");
        let op = Request::new(OpCode::Increment, "n").decode_with(|reply| {
            <[u8; 8]>::try_from(reply.value.as_ref())
                .map(u64::from_be_bytes)
                .map_err(|_| KvError::decode("counter value must be 8 bytes"))
        });

        let err = correlator.execute(op, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn partial_lookup_failure_is_overall_success() {
        let (correlator, transport, mut rx) = setup();
        let specs = vec![
            PathSpec::get("a"),
            PathSpec::get("b"),
            PathSpec::get("c"),
            PathSpec::get("d"),
        ];
        let compiled = compile(MultiKind::Lookup, &specs).unwrap();
        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            let mut body: Vec<u8> = Vec::new();
            for (status, value) in [
                (Status::Success, &b"1"[..]),
                (Status::SubDocPathNotFound, &b""[..]),
                (Status::Success, &b"3"[..]),
                (Status::Success, &b"4"[..]),
            ] {
                body.put_u16(status.code());
                #[allow(clippy::cast_possible_truncation)]
                body.put_u32(value.len() as u32);
                body.put_slice(value);
            }
            transport.deliver(
                ReplyEnvelope::new(request.opaque, Status::SubDocMultiPathFailure).with_value(body),
            );
        });

        let decode_specs = specs.clone();
        let op = Request::new(OpCode::MultiLookup, "doc")
            .with_body(move || Body {
                extras: Bytes::new(),
                value: compiled.body,
            })
            .decode_with(move |reply| Ok(decompile(MultiKind::Lookup, &reply.value, &decode_specs)?));

        let results = correlator.execute(op, None, None).await.unwrap();
        assert_eq!(results.len(), 4);
        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).map(|r| r.index).collect();
        assert_eq!(failed, vec![1]);
        assert_eq!(results[1].error().unwrap().kind, ErrorKind::PathNotFound);
    }

    #[tokio::test]
    async fn concurrent_operations_resolve_independently() {
        let (correlator, transport, mut rx) = setup();
        tokio::spawn(async move {
            let mut pending = Vec::new();
            for _ in 0..3 {
                pending.push(rx.recv().await.unwrap());
            }
            // Answer in reverse submission order.
            for request in pending.into_iter().rev() {
                let key = request.key.clone();
                transport.deliver(ReplyEnvelope::new(request.opaque, Status::Success).with_value(key));
            }
        });

        let op = |key: &'static str| Request::new(OpCode::Get, key).decode_with(|reply| Ok(reply.value));
        let (a, b, c) = tokio::join!(
            correlator.execute(op("a"), None, None),
            correlator.execute(op("b"), None, None),
            correlator.execute(op("c"), None, None),
        );
        assert_eq!(a.unwrap().as_ref(), b"a");
        assert_eq!(b.unwrap().as_ref(), b"b");
        assert_eq!(c.unwrap().as_ref(), b"c");
    }

    #[tokio::test]
    async fn service_call_dispatches_request() {
        let (correlator, transport, rx) = setup();
        respond_with(transport, rx, Status::Success, b"svc");

        let reply = correlator
            .oneshot(Call::new(Request::new(OpCode::Get, "doc")))
            .await
            .unwrap();
        assert_eq!(reply.value.as_ref(), b"svc");
        assert_eq!(reply.cas, 77);
    }

    #[test]
    fn state_machine_transitions() {
        use ExecutionState::{Built, Cancelled, Completed, Failed, Submitted, TimedOut};

        assert!(Built.can_advance_to(Submitted));
        assert!(!Built.can_advance_to(Completed));
        for terminal in [Completed, Failed, TimedOut, Cancelled] {
            assert!(Submitted.can_advance_to(terminal));
            assert!(terminal.is_terminal());
            assert!(!terminal.can_advance_to(Submitted));
            assert!(!terminal.can_advance_to(Completed));
        }
        assert!(!Submitted.can_advance_to(Submitted));
    }

    #[test]
    fn opaque_skips_zero_on_wrap() {
        let (transport, _rx) = ChannelTransport::new(&ChannelTransportConfig::default());
        let correlator = Correlator::new(Arc::new(transport), &ClientConfig::default());
        correlator.inner.next_opaque.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(correlator.next_opaque(), u32::MAX);
        assert_eq!(correlator.next_opaque(), 1);
    }
}
