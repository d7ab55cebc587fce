//! Error types for the session layer.

use curtain_barrier::BarrierError;

/// Errors from the session controller's local entry points.
///
/// Signals arriving over the network are never answered with these —
/// protocol violations from peers are logged and dropped. The errors
/// exist for the *embedding application*: the external trigger calling
/// `request_transition` deserves to know its request was rejected, since
/// retrying is its responsibility.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation is only meaningful on the authority node.
    #[error("operation requires the authority role")]
    NotAuthority,

    /// The coordinator rejected the request.
    #[error(transparent)]
    Barrier(#[from] BarrierError),
}
