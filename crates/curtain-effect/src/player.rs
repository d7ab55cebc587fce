//! The per-node transition playback state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use curtain_protocol::EffectIndex;
use tracing::debug;

use crate::{
    CoverSurface, EffectError, EffectPlayback, EffectRegistry,
    PlaybackStatus, TransitionEffect,
};

// ---------------------------------------------------------------------------
// PlayerPhase
// ---------------------------------------------------------------------------

/// The player's position in the transition cycle.
///
/// ```text
/// Idle → PlayingOut → WaitingForAuthority → PlayingIn → Idle
/// ```
///
/// - **Idle**: no transition active.
/// - **PlayingOut**: the covering animation is running.
/// - **WaitingForAuthority**: the screen is covered; the node is blocked
///   on the authority's `Loaded` broadcast. No local animation runs and
///   there is no timeout — the wait is bounded only by the authority's
///   load.
/// - **PlayingIn**: the revealing animation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    Idle,
    PlayingOut,
    WaitingForAuthority,
    PlayingIn,
}

impl PlayerPhase {
    /// Whether a new transition may begin.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for PlayerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::PlayingOut => write!(f, "PlayingOut"),
            Self::WaitingForAuthority => write!(f, "WaitingForAuthority"),
            Self::PlayingIn => write!(f, "PlayingIn"),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerEvent
// ---------------------------------------------------------------------------

/// A completion emitted by [`TransitionPlayer::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The covering animation finished; the screen is hidden. The session
    /// controller turns this into an `AckTransitionedOut` to the
    /// authority.
    TransitionedOut,

    /// The revealing animation finished; the transition cycle is over.
    TransitionedIn,
}

// ---------------------------------------------------------------------------
// TransitionPlayer
// ---------------------------------------------------------------------------

/// Owns the currently selected effect and drives one node's playback.
///
/// The player is a plain struct mutated only from its node's event loop;
/// it holds no locks and spawns nothing. Each emitted [`PlayerEvent`]
/// corresponds to exactly one playback completion.
pub struct TransitionPlayer {
    registry: Arc<EffectRegistry>,
    active: EffectIndex,
    phase: PlayerPhase,
    /// The effect chosen at `begin_out`, kept until the cycle returns to
    /// `Idle` so `begin_in` reverses the same visual even if the active
    /// selection changed mid-transition.
    current: Option<Arc<dyn TransitionEffect>>,
    playback: Option<Box<dyn EffectPlayback>>,
}

impl TransitionPlayer {
    /// Creates an idle player with effect 0 selected.
    pub fn new(registry: Arc<EffectRegistry>) -> Self {
        Self {
            registry,
            active: EffectIndex(0),
            phase: PlayerPhase::Idle,
            current: None,
            playback: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    /// The effect the next `begin_out` will instantiate.
    pub fn active_effect(&self) -> EffectIndex {
        self.active
    }

    /// Selects the effect for the next transition.
    ///
    /// Independent of the transition cycle — valid in any phase, affects
    /// only the next `begin_out`. Setting the already-active index is a
    /// no-op.
    ///
    /// # Errors
    /// [`EffectError::UnknownEffect`] if the index is out of range; the
    /// selection is left unchanged.
    pub fn set_active_effect(
        &mut self,
        index: EffectIndex,
    ) -> Result<(), EffectError> {
        if !self.registry.is_valid(index) {
            return Err(EffectError::UnknownEffect(index));
        }
        if self.active != index {
            debug!(%index, "active transition effect changed");
            self.active = index;
        }
        Ok(())
    }

    /// Starts the covering animation.
    ///
    /// # Errors
    /// [`EffectError::TransitionInFlight`] unless the player is `Idle`;
    /// the rejected call leaves phase and playback untouched.
    pub fn begin_out(&mut self) -> Result<(), EffectError> {
        if !self.phase.is_idle() {
            return Err(EffectError::TransitionInFlight(self.phase));
        }

        let effect = Arc::clone(
            self.registry
                .get(self.active)
                .expect("active index is validated on every change"),
        );
        debug!(effect = effect.name(), "transition out starting");

        self.playback = Some(effect.play_out());
        self.current = Some(effect);
        self.phase = PlayerPhase::PlayingOut;
        Ok(())
    }

    /// Starts the revealing animation after the authority's release.
    ///
    /// # Errors
    /// [`EffectError::NotWaitingForAuthority`] unless the player is in
    /// `WaitingForAuthority`; the rejected call mutates nothing.
    pub fn begin_in(&mut self) -> Result<(), EffectError> {
        if self.phase != PlayerPhase::WaitingForAuthority {
            return Err(EffectError::NotWaitingForAuthority(self.phase));
        }

        let effect = self
            .current
            .as_ref()
            .expect("an out-playback always records its effect");
        debug!(effect = effect.name(), "transition in starting");

        self.playback = Some(effect.play_in());
        self.phase = PlayerPhase::PlayingIn;
        Ok(())
    }

    /// Advances the running animation by one tick.
    ///
    /// Returns a [`PlayerEvent`] on the tick that completes a playback;
    /// `None` otherwise. Ticking an `Idle` or `WaitingForAuthority`
    /// player is a no-op.
    pub fn tick(
        &mut self,
        dt: Duration,
        surface: Option<&mut dyn CoverSurface>,
    ) -> Option<PlayerEvent> {
        let playback = self.playback.as_mut()?;

        match playback.advance(dt, surface) {
            PlaybackStatus::Running => None,
            PlaybackStatus::Complete => {
                self.playback = None;
                match self.phase {
                    PlayerPhase::PlayingOut => {
                        self.phase = PlayerPhase::WaitingForAuthority;
                        debug!("transitioned out; waiting for authority");
                        Some(PlayerEvent::TransitionedOut)
                    }
                    PlayerPhase::PlayingIn => {
                        self.phase = PlayerPhase::Idle;
                        self.current = None;
                        debug!("transitioned in; player idle");
                        Some(PlayerEvent::TransitionedIn)
                    }
                    // A playback only exists in the two playing phases.
                    _ => None,
                }
            }
        }
    }
}
