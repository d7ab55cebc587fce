//! Wire protocol for Curtain.
//!
//! This crate defines the language that the authority and its followers
//! speak while coordinating a scene transition:
//!
//! - **Types** ([`Signal`], [`Envelope`], [`ParticipantId`], etc.) — the
//!   message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! controllers (per-node transition logic). It doesn't know about
//! connections, barriers, or effects — it only knows how signals are
//! shaped and serialized.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session controller (node logic)
//! ```
//!
//! Delivery is assumed reliable and ordered per sender; the protocol
//! carries no channel selection or retransmission machinery.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    EffectIndex, Envelope, ParticipantId, Recipient, ResourceId, Signal,
};

/// The current protocol version. A [`Signal::Join`] carrying any other
/// version is rejected during the membership handshake.
pub const PROTOCOL_VERSION: u32 = 1;
