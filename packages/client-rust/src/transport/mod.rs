//! Transport contract between the execution core and the network.
//!
//! The core never frames bytes or owns sockets. It hands a [`Request`] and the
//! [`ReplySlot`] to resolve to a [`Transport`], which routes the eventual reply
//! back by the request's correlation token (`opaque`).

pub mod channel;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::operation::Request;
use crate::slot::ReplySlot;

pub use channel::{ChannelTransport, InFlightRequests};

/// A shared, concurrently used link to the server.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Hands off `request`. Once a reply for `request.opaque` arrives the
    /// transport resolves `slot` with it; if the connection is lost it may
    /// fail the slot, or never resolve it at all.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request could not be handed off.
    async fn send(&self, request: Request, slot: ReplySlot) -> Result<(), TransportError>;

    /// Forgets any routing state for `opaque`. Called once per request after
    /// its wait ended, on every exit path. Default is a no-op.
    fn release(&self, _opaque: u32) {}
}
