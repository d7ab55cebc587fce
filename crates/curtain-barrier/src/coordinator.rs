//! The authority's barrier coordinator.

use std::collections::HashSet;

use curtain_protocol::{ParticipantId, Recipient, ResourceId, Signal};
use tracing::{debug, info, trace, warn};

use crate::{
    AckOutcome, BarrierError, BarrierPhase, LoadError, TransitionSession,
};

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Work the coordinator's owner must perform outside the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierCommand {
    /// Stage `resource` via the scene loader, activate it, then report
    /// back with `load_complete` / `load_failed`.
    BeginLoad(ResourceId),
}

/// The outbound signals and command produced by one coordinator
/// operation. The coordinator does no I/O itself; the node event loop
/// delivers these.
#[derive(Debug, Default)]
pub struct BarrierOutput {
    /// Signals to deliver, fanned out by recipient. `All` includes the
    /// authority's own local controller.
    pub outbound: Vec<(Recipient, Signal)>,

    /// At most one load command per completed barrier.
    pub command: Option<BarrierCommand>,
}

impl BarrierOutput {
    fn none() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Tracks participant acknowledgements for the "out" phase, triggers the
/// load once all are in, and broadcasts the release.
///
/// Owned by the authority's session controller and mutated only from the
/// authority's event loop — no locks, no interior mutability. There is
/// exactly one coordinator per authority and at most one open
/// [`TransitionSession`] at any time.
///
/// The ack barrier has **no timeout**: a participant that stays connected
/// but never acknowledges stalls the transition indefinitely. Disconnects
/// are handled (the barrier shrinks); silence is not. Any timeout/retry
/// policy belongs to whatever issues `RequestTransition`.
pub struct BarrierCoordinator {
    connected: HashSet<ParticipantId>,
    phase: BarrierPhase,
    session: Option<TransitionSession>,
}

impl BarrierCoordinator {
    /// Creates an idle coordinator with an empty roster.
    pub fn new() -> Self {
        Self {
            connected: HashSet::new(),
            phase: BarrierPhase::Idle,
            session: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> BarrierPhase {
        self.phase
    }

    /// Participants currently connected.
    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    /// The open session's expected-ack count, if a session is open.
    pub fn expected_count(&self) -> Option<usize> {
        self.session.as_ref().map(TransitionSession::expected_count)
    }

    /// The open session's recorded-ack count, if a session is open.
    pub fn acked_count(&self) -> Option<usize> {
        self.session.as_ref().map(TransitionSession::acked_count)
    }

    // -- Roster maintenance ------------------------------------------------

    /// Records a participant joining.
    ///
    /// A participant joining while a session is open is *not* added to
    /// that session's snapshot; it participates from the next transition
    /// on.
    pub fn participant_joined(&mut self, participant: ParticipantId) {
        self.connected.insert(participant);
        trace!(%participant, connected = self.connected.len(), "participant joined");
    }

    /// Records a participant leaving.
    ///
    /// During `CollectingAcks` the departed participant is removed from
    /// the open session's barrier so the authority never waits on a node
    /// that can no longer acknowledge. If it was the last pending one,
    /// the barrier advances right here.
    pub fn participant_left(
        &mut self,
        participant: ParticipantId,
    ) -> BarrierOutput {
        self.connected.remove(&participant);
        trace!(%participant, connected = self.connected.len(), "participant left");

        if self.phase != BarrierPhase::CollectingAcks {
            return BarrierOutput::none();
        }

        let session = self
            .session
            .as_mut()
            .expect("CollectingAcks always has an open session");
        session.remove_participant(participant);
        warn!(
            %participant,
            expected = session.expected_count(),
            acked = session.acked_count(),
            "participant left mid-barrier — expected set shrunk"
        );

        self.try_close_barrier()
    }

    // -- The barrier protocol ----------------------------------------------

    /// Opens a new transition session for `resource`.
    ///
    /// Snapshots the connected roster as the expected-ack set, clears any
    /// previous acknowledgements, and broadcasts `StartTransition` to all
    /// participants (the authority's own controller included). With an
    /// empty roster the barrier is vacuously met and the load begins
    /// immediately.
    ///
    /// # Errors
    /// [`BarrierError::SessionInFlight`] unless the coordinator is
    /// `Idle`; nothing is mutated on rejection.
    pub fn request_transition(
        &mut self,
        resource: ResourceId,
    ) -> Result<BarrierOutput, BarrierError> {
        if !self.phase.is_idle() {
            return Err(BarrierError::SessionInFlight(self.phase));
        }

        let session =
            TransitionSession::new(resource.clone(), self.connected.clone());
        info!(
            %resource,
            expected = session.expected_count(),
            "transition session opened"
        );

        self.session = Some(session);
        self.phase = BarrierPhase::CollectingAcks;

        let mut output = self.try_close_barrier();
        output
            .outbound
            .insert(0, (Recipient::All, Signal::StartTransition { resource }));
        Ok(output)
    }

    /// Records an `AckTransitionedOut` from `participant`.
    ///
    /// Duplicates are no-ops; acks from ids outside the session snapshot
    /// are ignored. The load command is emitted exactly once — on the
    /// ack that completes the barrier, never before.
    pub fn acknowledge(
        &mut self,
        participant: ParticipantId,
    ) -> BarrierOutput {
        if self.phase != BarrierPhase::CollectingAcks {
            debug!(%participant, phase = %self.phase, "ack outside CollectingAcks — ignoring");
            return BarrierOutput::none();
        }

        let session = self
            .session
            .as_mut()
            .expect("CollectingAcks always has an open session");

        match session.acknowledge(participant) {
            AckOutcome::Recorded => {
                debug!(
                    %participant,
                    acked = session.acked_count(),
                    expected = session.expected_count(),
                    "transition-out acknowledged"
                );
            }
            AckOutcome::Duplicate => {
                debug!(%participant, "duplicate ack — ignoring");
            }
            AckOutcome::NotRequired => {
                debug!(%participant, "ack from non-session participant — ignoring");
            }
        }

        self.try_close_barrier()
    }

    /// Reports that the staged scene has been activated.
    ///
    /// Broadcasts `Loaded` to every participant, discards the session,
    /// and returns to `Idle`. The `Releasing` phase is transient inside
    /// this call.
    pub fn load_complete(&mut self) -> BarrierOutput {
        if self.phase != BarrierPhase::Loading {
            debug!(phase = %self.phase, "load_complete outside Loading — ignoring");
            return BarrierOutput::none();
        }

        self.phase = BarrierPhase::Releasing;
        trace!("releasing participants");

        let session = self
            .session
            .take()
            .expect("Loading always has an open session");
        info!(resource = %session.resource(), "scene active — releasing all participants");

        self.phase = BarrierPhase::Idle;

        BarrierOutput {
            outbound: vec![(Recipient::All, Signal::Loaded)],
            command: None,
        }
    }

    /// Reports that staging or activation failed.
    ///
    /// The coordinator returns to `Idle` **without** a release broadcast:
    /// participants stay covered in their waiting state rather than
    /// revealing a broken scene. No retry is attempted here — that is
    /// the external trigger's call.
    pub fn load_failed(&mut self, error: &LoadError) -> BarrierOutput {
        if self.phase != BarrierPhase::Loading {
            debug!(phase = %self.phase, "load_failed outside Loading — ignoring");
            return BarrierOutput::none();
        }

        let session = self
            .session
            .take()
            .expect("Loading always has an open session");
        warn!(
            resource = %session.resource(),
            %error,
            "scene load failed — participants remain covered"
        );

        self.phase = BarrierPhase::Idle;
        BarrierOutput::none()
    }

    // -- Internal ------------------------------------------------------------

    /// Advances `CollectingAcks → Loading` if the barrier is met.
    fn try_close_barrier(&mut self) -> BarrierOutput {
        let session = match &self.session {
            Some(s) if self.phase == BarrierPhase::CollectingAcks => s,
            _ => return BarrierOutput::none(),
        };

        if !session.is_complete() {
            return BarrierOutput::none();
        }

        self.phase = BarrierPhase::Loading;
        let resource = session.resource().clone();
        info!(%resource, "all participants covered — beginning load");

        BarrierOutput {
            outbound: Vec::new(),
            command: Some(BarrierCommand::BeginLoad(resource)),
        }
    }
}

impl Default for BarrierCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
