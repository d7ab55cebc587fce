//! Signal channels for Curtain.
//!
//! The transition protocol assumes a reliable, ordered
//! request/acknowledge channel between the authority and each follower.
//! This crate is that assumption made concrete:
//!
//! - [`SignalChannel`] / [`SignalListener`] — the channel abstraction.
//!   Channels are *typed*: they carry [`Envelope`]s, not bytes, so no
//!   other layer ever touches serialization.
//! - [`WebSocketListener`] / [`WebSocketChannel`] — the real-network
//!   implementation via `tokio-tungstenite` (behind the default
//!   `websocket` feature).
//! - [`memory`] — connected in-process channel pairs for tests and
//!   single-process demos.
//!
//! [`Envelope`]: curtain_protocol::Envelope

#![allow(async_fn_in_trait)]

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::ChannelError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketChannel, WebSocketListener};

use std::fmt;
use std::future::Future;

use curtain_protocol::Envelope;

/// Opaque identifier for a channel, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Creates a `ChannelId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

/// A reliable, ordered, bidirectional envelope channel.
///
/// Every implementation must preserve per-sender ordering and deliver
/// without loss until closed — the barrier protocol counts on it.
pub trait SignalChannel: Send + Sync + 'static {
    /// Sends an envelope to the remote peer.
    fn send(
        &self,
        envelope: &Envelope,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Receives the next envelope from the remote peer.
    ///
    /// Returns `Ok(None)` when the channel is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Envelope>, ChannelError>> + Send;

    /// Closes the channel.
    fn close(&self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// The unique identifier for this channel.
    fn id(&self) -> ChannelId;
}

/// Accepts incoming channels on the authority side.
pub trait SignalListener: Send + Sync + 'static {
    /// The channel type produced by this listener.
    type Channel: SignalChannel;

    /// Waits for and accepts the next incoming channel.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Channel, ChannelError>> + Send;
}
