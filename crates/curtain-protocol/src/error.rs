//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding signals.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a signal into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a signal).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates protocol rules — e.g. a `Join`
    /// carrying an unsupported version, or a non-`Join` first message
    /// during the membership handshake.
    #[error("invalid signal: {0}")]
    InvalidSignal(String),
}
