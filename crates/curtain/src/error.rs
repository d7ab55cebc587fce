//! Unified error type for the Curtain facade.

use curtain_barrier::BarrierError;
use curtain_effect::EffectError;
use curtain_protocol::ProtocolError;
use curtain_session::SessionError;
use curtain_transport::ChannelError;

/// Top-level error that wraps all layer-specific errors.
///
/// When using the `curtain` facade you deal with this single type; the
/// `#[from]` impls let `?` convert layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CurtainError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A protocol-level error (encode, decode, handshake violation).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An effect-level error (registry, playback control).
    #[error(transparent)]
    Effect(#[from] EffectError),

    /// A barrier-level error (session already in flight).
    #[error(transparent)]
    Barrier(#[from] BarrierError),

    /// A session-level error (role misuse).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The node's event loop is gone; no commands can reach it.
    #[error("node has shut down")]
    NodeGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channel_error() {
        let err = ChannelError::Closed("gone".into());
        let curtain_err: CurtainError = err.into();
        assert!(matches!(curtain_err, CurtainError::Channel(_)));
        assert!(curtain_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidSignal("bad".into());
        let curtain_err: CurtainError = err.into();
        assert!(matches!(curtain_err, CurtainError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotAuthority;
        let curtain_err: CurtainError = err.into();
        assert!(matches!(curtain_err, CurtainError::Session(_)));
    }
}
