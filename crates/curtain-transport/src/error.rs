//! Error types for the transport layer.

use curtain_protocol::ProtocolError;

/// Errors that can occur on a signal channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel was closed.
    #[error("channel closed: {0}")]
    Closed(String),

    /// Sending an envelope failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving an envelope failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding, accepting, or connecting failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// A received frame could not be decoded (or an envelope could not
    /// be encoded). The node loop treats a channel producing these as
    /// disconnected.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
