//! Transition effects and local playback for Curtain.
//!
//! This crate owns everything a single node does visually during a
//! synchronized transition:
//!
//! - [`TransitionEffect`] — a named, immutable effect capability
//!   ([`FadeEffect`] is the stock implementation)
//! - [`EffectRegistry`] — the fixed, ordered list of effects every node
//!   registers identically at startup, addressed by
//!   [`EffectIndex`](curtain_protocol::EffectIndex)
//! - [`TransitionPlayer`] — the per-node state machine that plays the
//!   "out" animation, waits for the authority, and plays the "in"
//!   animation
//! - [`CoverSurface`] — the opaque render collaborator an effect draws on
//!
//! None of this knows about the network. The session layer feeds the
//! player signals and ticks; the player reports completions back as
//! [`PlayerEvent`]s.

mod error;
mod fade;
mod player;
mod registry;
mod surface;

pub use error::EffectError;
pub use fade::FadeEffect;
pub use player::{PlayerEvent, PlayerPhase, TransitionPlayer};
pub use registry::EffectRegistry;
pub use surface::CoverSurface;

use std::time::Duration;

// ---------------------------------------------------------------------------
// Effect traits
// ---------------------------------------------------------------------------

/// Whether a playback is still animating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Still animating; keep ticking.
    Running,
    /// Finished. The player consumes the playback on this status, so it
    /// is observed exactly once per playback.
    Complete,
}

/// A registered, immutable, named transition effect.
///
/// Effects are pure animation capabilities with no coordination
/// awareness: each `play_*` call instantiates a fresh [`EffectPlayback`]
/// that covers (`play_out`) or reveals (`play_in`) the scene over a
/// bounded duration.
pub trait TransitionEffect: Send + Sync + 'static {
    /// Human-readable effect name (for logs).
    fn name(&self) -> &str;

    /// Starts the covering animation (scene → covered).
    fn play_out(&self) -> Box<dyn EffectPlayback>;

    /// Starts the revealing animation (covered → scene).
    fn play_in(&self) -> Box<dyn EffectPlayback>;
}

/// One in-flight animation, advanced by the node's tick loop.
pub trait EffectPlayback: Send {
    /// Advances the animation by one tick.
    ///
    /// A missing surface must never stall the caller: when `surface` is
    /// `None` the playback completes immediately as a degenerate no-op.
    /// The visual failing silently is acceptable; the barrier
    /// deadlocking is not.
    fn advance(
        &mut self,
        dt: Duration,
        surface: Option<&mut dyn CoverSurface>,
    ) -> PlaybackStatus;
}
