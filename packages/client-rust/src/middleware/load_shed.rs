//! Load-shedding middleware.
//!
//! Rejects calls with `KvError::Overloaded` once `max_concurrent_operations`
//! are already in flight, instead of queueing them behind the transport.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::debug;

use crate::correlator::Call;
use crate::error::KvError;
use crate::operation::ReplyEnvelope;

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

/// Tower layer that limits concurrent calls via a semaphore.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Arc<Semaphore>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: self.semaphore.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

/// Service wrapper that fails fast when every permit is taken.
#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> LoadShedService<S> {
    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl<S> Service<Call> for LoadShedService<S>
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
        let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
            debug!(opcode = %call.request.opcode, "shedding operation");
            return Box::pin(async { Err(KvError::Overloaded) });
        };

        let fut = self.inner.call(call);
        Box::pin(async move {
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
