//! One-shot reply slot shared by the correlator and the transport.
//!
//! Delivery, deadline and cancellation all race to resolve the same slot. The
//! first writer wins a compare-and-set on the `resolved` flag; every later
//! write is rejected with [`SlotError`] and leaves the recorded outcome intact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::operation::ReplyEnvelope;

/// The single outcome recorded in a slot.
#[derive(Debug)]
pub enum SlotOutcome {
    /// The transport delivered a reply envelope (success or not).
    Delivered(ReplyEnvelope),
    /// The transport gave up on the request.
    Failed(TransportError),
    /// The deadline elapsed first.
    TimedOut,
    /// The caller's cancellation fired first.
    Cancelled,
}

/// A second attempt to resolve an already resolved slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("reply slot for opaque {opaque} already resolved")]
pub struct SlotError {
    pub opaque: u32,
}

struct SlotInner {
    opaque: u32,
    resolved: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<SlotOutcome>>>,
}

/// Write side of a pending reply. Cheap to clone; all clones share one cell.
#[derive(Clone)]
pub struct ReplySlot {
    inner: Arc<SlotInner>,
}

/// Read side of a pending reply, owned by the waiting call.
pub type SlotReceiver = oneshot::Receiver<SlotOutcome>;

impl ReplySlot {
    /// Creates a slot for the request identified by `opaque`.
    #[must_use]
    pub fn new(opaque: u32) -> (Self, SlotReceiver) {
        let (tx, rx) = oneshot::channel();
        let slot = Self {
            inner: Arc::new(SlotInner {
                opaque,
                resolved: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
            }),
        };
        (slot, rx)
    }

    #[must_use]
    pub fn opaque(&self) -> u32 {
        self.inner.opaque
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.load(Ordering::Acquire)
    }

    /// Resolves the slot with a reply from the server.
    ///
    /// # Errors
    ///
    /// Returns `SlotError` if the slot was already resolved (for example the
    /// deadline elapsed before the reply arrived). The reply is discarded.
    pub fn deliver(&self, reply: ReplyEnvelope) -> Result<(), SlotError> {
        self.resolve(SlotOutcome::Delivered(reply))
    }

    /// Resolves the slot with a transport failure.
    ///
    /// # Errors
    ///
    /// Returns `SlotError` if the slot was already resolved.
    pub fn fail(&self, err: TransportError) -> Result<(), SlotError> {
        self.resolve(SlotOutcome::Failed(err))
    }

    /// Records `outcome` if no outcome has been recorded yet.
    ///
    /// # Errors
    ///
    /// Returns `SlotError` if another writer resolved the slot first.
    pub fn resolve(&self, outcome: SlotOutcome) -> Result<(), SlotError> {
        if self
            .inner
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SlotError {
                opaque: self.inner.opaque,
            });
        }
        if let Some(tx) = self.inner.tx.lock().take() {
            // A dropped receiver means the waiting call is gone; nothing to do.
            let _ = tx.send(outcome);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReplySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySlot")
            .field("opaque", &self.inner.opaque)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use kvwire_core::Status;

    use super::*;

    #[tokio::test]
    async fn first_resolution_wins() {
        let (slot, rx) = ReplySlot::new(7);
        slot.deliver(ReplyEnvelope::new(7, Status::Success).with_cas(1))
            .unwrap();

        let err = slot.resolve(SlotOutcome::TimedOut).unwrap_err();
        assert_eq!(err, SlotError { opaque: 7 });
        assert!(slot.deliver(ReplyEnvelope::new(7, Status::Success)).is_err());

        match rx.await.unwrap() {
            SlotOutcome::Delivered(reply) => assert_eq!(reply.cas, 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn clones_share_the_cell() {
        let (slot, rx) = ReplySlot::new(1);
        let transport_side = slot.clone();
        slot.resolve(SlotOutcome::Cancelled).unwrap();
        assert!(transport_side.is_resolved());
        assert!(transport_side.fail(TransportError::Disconnected).is_err());
        assert!(matches!(rx.await.unwrap(), SlotOutcome::Cancelled));
    }

    #[test]
    fn resolving_after_receiver_dropped_still_counts() {
        let (slot, rx) = ReplySlot::new(3);
        drop(rx);
        assert!(slot.resolve(SlotOutcome::TimedOut).is_ok());
        assert!(slot.resolve(SlotOutcome::TimedOut).is_err());
    }

    #[test]
    fn concurrent_writers_resolve_exactly_once() {
        let (slot, _rx) = ReplySlot::new(9);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let slot = slot.clone();
                std::thread::spawn(move || {
                    slot.deliver(ReplyEnvelope::new(9, Status::Success).with_cas(i))
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
