//! The per-node session controller.

use std::sync::Arc;
use std::time::Duration;

use curtain_barrier::{BarrierCommand, BarrierCoordinator, BarrierOutput};
use curtain_effect::{
    CoverSurface, EffectRegistry, PlayerEvent, TransitionPlayer,
};
use curtain_protocol::{
    EffectIndex, ParticipantId, Recipient, ResourceId, Signal,
};
use tracing::{debug, trace, warn};

use crate::SessionError;

// ---------------------------------------------------------------------------
// ControllerOutput
// ---------------------------------------------------------------------------

/// The I/O a controller operation asks its node event loop to perform.
#[derive(Debug, Default)]
pub struct ControllerOutput {
    /// Signals for this node's authority (follower role). A follower has
    /// exactly one peer, so these need no recipient.
    pub upstream: Vec<Signal>,

    /// Signals to fan out to participants (authority role). `All`
    /// includes the authority's own controller — the event loop feeds
    /// those back locally.
    pub fanout: Vec<(Recipient, Signal)>,

    /// Load work to start (authority role).
    pub command: Option<BarrierCommand>,
}

impl ControllerOutput {
    fn none() -> Self {
        Self::default()
    }

    fn from_barrier(output: BarrierOutput) -> Self {
        Self {
            upstream: Vec::new(),
            fanout: output.outbound,
            command: output.command,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Wires one node's [`TransitionPlayer`] to the network.
///
/// Every node runs one. A follower's controller maps the authority's
/// broadcasts onto the local player and reports the player's
/// transitioned-out completion upstream. The authority's controller does
/// the same for its own local player and additionally hosts the
/// [`BarrierCoordinator`], turning inbound acks and transition requests
/// into barrier progress.
///
/// Inbound protocol violations — a `StartTransition` while a transition
/// is already in flight, an out-of-range effect index — are logged and
/// dropped, never answered and never allowed to mutate state.
pub struct SessionController {
    participant: ParticipantId,
    player: TransitionPlayer,
    registry: Arc<EffectRegistry>,
    /// `Some` on the authority, `None` on followers.
    coordinator: Option<BarrierCoordinator>,
}

impl SessionController {
    /// Creates a follower controller.
    pub fn follower(
        participant: ParticipantId,
        registry: Arc<EffectRegistry>,
    ) -> Self {
        Self {
            participant,
            player: TransitionPlayer::new(Arc::clone(&registry)),
            registry,
            coordinator: None,
        }
    }

    /// Creates the authority controller, hosting the barrier coordinator.
    pub fn authority(
        participant: ParticipantId,
        registry: Arc<EffectRegistry>,
    ) -> Self {
        Self {
            participant,
            player: TransitionPlayer::new(Arc::clone(&registry)),
            registry,
            coordinator: Some(BarrierCoordinator::new()),
        }
    }

    /// This node's participant id.
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Whether this controller hosts the coordinator.
    pub fn is_authority(&self) -> bool {
        self.coordinator.is_some()
    }

    /// The local player, for phase inspection.
    pub fn player(&self) -> &TransitionPlayer {
        &self.player
    }

    /// The coordinator, if this is the authority.
    pub fn coordinator(&self) -> Option<&BarrierCoordinator> {
        self.coordinator.as_ref()
    }

    // -- Membership (authority role) -----------------------------------------

    /// Forwards a join to the coordinator. No-op on followers.
    pub fn participant_joined(&mut self, participant: ParticipantId) {
        if let Some(coordinator) = &mut self.coordinator {
            coordinator.participant_joined(participant);
        }
    }

    /// Forwards a leave to the coordinator. No-op on followers.
    pub fn participant_left(
        &mut self,
        participant: ParticipantId,
    ) -> ControllerOutput {
        match &mut self.coordinator {
            Some(coordinator) => ControllerOutput::from_barrier(
                coordinator.participant_left(participant),
            ),
            None => ControllerOutput::none(),
        }
    }

    // -- Local entry points ----------------------------------------------------

    /// Starts a transition to `resource` (authority only).
    ///
    /// This is the external trigger's entry point. Unlike a peer's
    /// signal, a local rejection is returned, because retrying a refused
    /// or failed transition is the trigger's responsibility.
    pub fn request_transition(
        &mut self,
        resource: ResourceId,
    ) -> Result<ControllerOutput, SessionError> {
        let coordinator = self
            .coordinator
            .as_mut()
            .ok_or(SessionError::NotAuthority)?;
        let output = coordinator.request_transition(resource)?;
        Ok(ControllerOutput::from_barrier(output))
    }

    /// Asks for `index` to become every participant's active effect.
    ///
    /// On the authority this validates and fans out `SetActiveEffect`
    /// directly; on a follower it sends `RequestEffectChange` upstream
    /// for the authority to validate and rebroadcast. Independent of the
    /// barrier — legal in any phase.
    pub fn request_effect_change(
        &mut self,
        index: EffectIndex,
    ) -> ControllerOutput {
        if self.is_authority() {
            self.validate_and_broadcast_effect(index)
        } else {
            ControllerOutput {
                upstream: vec![Signal::RequestEffectChange { index }],
                ..Default::default()
            }
        }
    }

    // -- Load results (authority role) ----------------------------------------

    /// Reports a successful stage-and-activate to the coordinator.
    /// Called by the node loop when the work started by
    /// [`BarrierCommand::BeginLoad`] finishes.
    pub fn load_complete(&mut self) -> ControllerOutput {
        match &mut self.coordinator {
            Some(coordinator) => {
                ControllerOutput::from_barrier(coordinator.load_complete())
            }
            None => ControllerOutput::none(),
        }
    }

    /// Reports a failed load to the coordinator.
    pub fn load_failed(
        &mut self,
        error: &curtain_barrier::LoadError,
    ) -> ControllerOutput {
        match &mut self.coordinator {
            Some(coordinator) => {
                ControllerOutput::from_barrier(coordinator.load_failed(error))
            }
            None => ControllerOutput::none(),
        }
    }

    // -- Signal handling ----------------------------------------------------

    /// Processes one inbound signal.
    ///
    /// `from` is the sending participant where the transport knows it
    /// (authority receiving from a follower); `None` for signals from
    /// the authority or fed back locally.
    pub fn handle_signal(
        &mut self,
        from: Option<ParticipantId>,
        signal: Signal,
    ) -> ControllerOutput {
        match signal {
            // -- Broadcasts every node acts on --
            Signal::StartTransition { resource } => {
                trace!(%resource, "start-transition received");
                if let Err(e) = self.player.begin_out() {
                    debug!(error = %e, "begin_out rejected — dropping");
                }
                ControllerOutput::none()
            }

            Signal::Loaded => {
                trace!("release received");
                if let Err(e) = self.player.begin_in() {
                    debug!(error = %e, "begin_in rejected — dropping");
                }
                ControllerOutput::none()
            }

            Signal::SetActiveEffect { index } => {
                if let Err(e) = self.player.set_active_effect(index) {
                    warn!(%index, error = %e, "effect selection rejected");
                }
                ControllerOutput::none()
            }

            // -- Authority-bound signals --
            Signal::AckTransitionedOut { participant } => {
                match &mut self.coordinator {
                    Some(coordinator) => ControllerOutput::from_barrier(
                        coordinator.acknowledge(participant),
                    ),
                    None => {
                        debug!(%participant, "ack received by follower — dropping");
                        ControllerOutput::none()
                    }
                }
            }

            Signal::RequestTransition { resource } => {
                if !self.is_authority() {
                    debug!(%resource, "transition request received by follower — dropping");
                    return ControllerOutput::none();
                }
                match self.request_transition(resource) {
                    Ok(output) => output,
                    Err(e) => {
                        // A peer's request gets no answer; it simply
                        // doesn't happen.
                        warn!(error = %e, "transition request rejected");
                        ControllerOutput::none()
                    }
                }
            }

            Signal::RequestEffectChange { index } => {
                if !self.is_authority() {
                    debug!(%index, "effect-change request received by follower — dropping");
                    return ControllerOutput::none();
                }
                self.validate_and_broadcast_effect(index)
            }

            // -- Membership plumbing handled by the node loop --
            Signal::Join { .. }
            | Signal::Welcome { .. }
            | Signal::Disconnect { .. } => {
                trace!(?from, "membership signal reached controller — ignoring");
                ControllerOutput::none()
            }
        }
    }

    // -- Ticking --------------------------------------------------------------

    /// Advances the local player by one tick.
    ///
    /// A completed "out" playback becomes this participant's
    /// acknowledgement: sent upstream on a follower, fed straight into
    /// the coordinator on the authority (the authority doesn't message
    /// itself).
    pub fn tick(
        &mut self,
        dt: Duration,
        surface: Option<&mut dyn CoverSurface>,
    ) -> ControllerOutput {
        match self.player.tick(dt, surface) {
            Some(PlayerEvent::TransitionedOut) => {
                let participant = self.participant;
                match &mut self.coordinator {
                    Some(coordinator) => ControllerOutput::from_barrier(
                        coordinator.acknowledge(participant),
                    ),
                    None => ControllerOutput {
                        upstream: vec![Signal::AckTransitionedOut {
                            participant,
                        }],
                        ..Default::default()
                    },
                }
            }
            Some(PlayerEvent::TransitionedIn) => {
                trace!("transition cycle complete");
                ControllerOutput::none()
            }
            None => ControllerOutput::none(),
        }
    }

    // -- Internal ---------------------------------------------------------------

    /// Authority path for effect changes: validate against the registry,
    /// then fan the selection out to everyone (this controller applies
    /// it when the broadcast is fed back locally).
    fn validate_and_broadcast_effect(
        &mut self,
        index: EffectIndex,
    ) -> ControllerOutput {
        if !self.registry.is_valid(index) {
            warn!(%index, "effect-change request for unregistered effect — dropping");
            return ControllerOutput::none();
        }

        let mut output = ControllerOutput::none();
        output
            .fanout
            .push((Recipient::All, Signal::SetActiveEffect { index }));
        output
    }
}
