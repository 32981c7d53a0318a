//! Channel-backed transport with an in-flight registry keyed by opaque.
//!
//! Requests are pushed into a bounded mpsc channel drained by whatever owns
//! the connection (a socket writer, or a test). Replies come back through
//! [`ChannelTransport::deliver`], which routes them to the waiting slot.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::Transport;
use crate::config::ChannelTransportConfig;
use crate::error::TransportError;
use crate::operation::{ReplyEnvelope, Request};
use crate::slot::ReplySlot;

// ---------------------------------------------------------------------------
// InFlightRequests
// ---------------------------------------------------------------------------

/// Slots awaiting a reply, keyed by correlation token.
#[derive(Debug, Default)]
pub struct InFlightRequests {
    slots: DashMap<u32, ReplySlot>,
}

impl InFlightRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, slot: ReplySlot) {
        self.slots.insert(slot.opaque(), slot);
    }

    /// Removes and returns the slot waiting on `opaque`.
    pub fn take(&self, opaque: u32) -> Option<ReplySlot> {
        self.slots.remove(&opaque).map(|(_, slot)| slot)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Removes and returns every registered slot.
    pub fn drain_all(&self) -> Vec<ReplySlot> {
        let keys: Vec<u32> = self.slots.iter().map(|entry| *entry.key()).collect();
        let mut slots = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, slot)) = self.slots.remove(&key) {
                slots.push(slot);
            }
        }
        slots
    }
}

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

/// Transport that queues requests on an mpsc channel and routes replies by opaque.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Request>,
    in_flight: InFlightRequests,
    send_timeout: Duration,
}

impl ChannelTransport {
    /// Creates the transport and the receiver the connection writer drains.
    #[must_use]
    pub fn new(config: &ChannelTransportConfig) -> (Self, mpsc::Receiver<Request>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let transport = Self {
            tx,
            in_flight: InFlightRequests::new(),
            send_timeout: config.send_timeout,
        };
        (transport, rx)
    }

    /// Routes `reply` to the slot registered under its opaque.
    ///
    /// Returns `false` if no request is waiting on that opaque, either because
    /// it already timed out or was cancelled, or because the opaque is unknown.
    pub fn deliver(&self, reply: ReplyEnvelope) -> bool {
        let opaque = reply.opaque;
        let Some(slot) = self.in_flight.take(opaque) else {
            debug!(opaque, "discarding reply for unknown opaque");
            return false;
        };
        if slot.deliver(reply).is_err() {
            debug!(opaque, "discarding late reply for resolved request");
            return false;
        }
        true
    }

    /// Fails every in-flight request, e.g. when the connection drops.
    /// Returns the number of requests failed.
    pub fn fail_all(&self, err: &TransportError) -> usize {
        self.in_flight
            .drain_all()
            .into_iter()
            .filter(|slot| slot.fail(err.clone()).is_ok())
            .count()
    }

    /// Number of requests waiting on a reply.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, request: Request, slot: ReplySlot) -> Result<(), TransportError> {
        let opaque = request.opaque;
        // Register before queueing so a fast reply always finds its slot.
        self.in_flight.register(slot);
        match tokio::time::timeout(self.send_timeout, self.tx.send(request)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                self.in_flight.take(opaque);
                Err(TransportError::Disconnected)
            }
            Err(_) => {
                self.in_flight.take(opaque);
                Err(TransportError::SendTimeout(self.send_timeout))
            }
        }
    }

    fn release(&self, opaque: u32) {
        self.in_flight.take(opaque);
    }
}
