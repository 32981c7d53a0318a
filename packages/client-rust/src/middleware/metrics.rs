//! Metrics middleware.
//!
//! Wraps each call in a `kv_operation` tracing span and records a counter and
//! a latency histogram through the `metrics` facade, labelled by opcode and
//! outcome (`ok` or the failure's error kind).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::correlator::Call;
use crate::error::KvError;
use crate::operation::ReplyEnvelope;

/// Counter incremented once per completed call.
pub const OPERATIONS_TOTAL: &str = "kvwire_operations_total";
/// Histogram of call latency in milliseconds.
pub const OPERATION_DURATION_MS: &str = "kvwire_operation_duration_ms";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records call duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Call> for MetricsService<S>
where
    S: Service<Call, Response = ReplyEnvelope, Error = KvError> + Send,
    S::Future: Send + 'static,
{
    type Response = ReplyEnvelope;
    type Error = KvError;
    type Future = Pin<Box<dyn Future<Output = Result<ReplyEnvelope, KvError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call) -> Self::Future {
        let opcode = call.request.opcode.name();
        let key_len = call.request.key.len();

        let span = info_span!(
            "kv_operation",
            opcode = opcode,
            key_len = key_len,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(call);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.kind().as_str(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!(OPERATIONS_TOTAL, "opcode" => opcode, "outcome" => outcome)
                    .increment(1);
                metrics::histogram!(OPERATION_DURATION_MS, "opcode" => opcode)
                    .record(elapsed.as_secs_f64() * 1000.0);

                tracing::debug!(opcode, duration_ms, outcome, "operation complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use kvwire_core::{OpCode, Status};
    use tower::ServiceExt;

    use super::*;
    use crate::operation::Request;

    /// Echoes the request key back, or fails with a fixed error.
    struct ImmediateService {
        fail: bool,
    }

    impl Service<Call> for ImmediateService {
        type Response = ReplyEnvelope;
        type Error = KvError;
        type Future = Pin<Box<dyn Future<Output = Result<ReplyEnvelope, KvError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, call: Call) -> Self::Future {
            let fail = self.fail;
            let key = call.request.key;
            Box::pin(async move {
                if fail {
                    Err(KvError::Cancelled)
                } else {
                    Ok(ReplyEnvelope::new(7, Status::Success).with_value(key))
                }
            })
        }
    }

    #[tokio::test]
    async fn passes_through_reply() {
        let svc = MetricsLayer.layer(ImmediateService { fail: false });
        let reply = svc
            .oneshot(Call::new(Request::new(OpCode::Get, "doc")))
            .await
            .unwrap();
        assert_eq!(reply.opaque, 7);
        assert_eq!(reply.value.as_ref(), b"doc");
    }

    #[tokio::test]
    async fn passes_through_error() {
        let svc = MetricsLayer.layer(ImmediateService { fail: true });
        let err = svc
            .oneshot(Call::new(Request::new(OpCode::Get, "doc")))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::Cancelled));
    }
}
