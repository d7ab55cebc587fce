//! Error types for the effect layer.

use curtain_protocol::EffectIndex;

use crate::PlayerPhase;

/// Errors that can occur during effect selection or playback control.
///
/// All of these are local protocol violations: the caller is rejected
/// with no state mutation, and the session layer logs and drops them
/// rather than propagating to peers.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// An effect registry must hold at least one effect, since index 0
    /// is the network-wide default selection.
    #[error("effect registry must contain at least one effect")]
    EmptyRegistry,

    /// The requested index doesn't resolve to a registered effect.
    #[error("no effect registered at {0}")]
    UnknownEffect(EffectIndex),

    /// `begin_out` was requested while a transition is already in
    /// flight.
    #[error("transition already in flight (player is {0})")]
    TransitionInFlight(PlayerPhase),

    /// `begin_in` was requested while the player is not blocked on the
    /// authority's release.
    #[error("cannot reveal while {0}; player is not waiting for the authority")]
    NotWaitingForAuthority(PlayerPhase),
}
