//! One in-flight transition attempt.

use std::collections::HashSet;

use curtain_protocol::{ParticipantId, ResourceId};

/// The result of recording an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// First ack from this participant; it now counts toward the barrier.
    Recorded,

    /// This participant had already acknowledged. Harmless no-op.
    Duplicate,

    /// The participant is not part of this session's snapshot — it
    /// joined after the session started, or was never connected. Ignored
    /// to preserve `acked ⊆ required`.
    NotRequired,
}

/// One transition attempt, owned exclusively by the coordinator.
///
/// Created when a transition is requested and destroyed when the release
/// broadcast goes out (or the load fails). `required` is a snapshot of
/// the participants connected at session start; it only ever shrinks
/// (disconnects), never grows.
#[derive(Debug)]
pub struct TransitionSession {
    resource: ResourceId,
    required: HashSet<ParticipantId>,
    acked: HashSet<ParticipantId>,
}

impl TransitionSession {
    /// Opens a session for `resource` with the given roster snapshot.
    pub fn new(
        resource: ResourceId,
        required: HashSet<ParticipantId>,
    ) -> Self {
        Self {
            resource,
            required,
            acked: HashSet::new(),
        }
    }

    /// The resource this transition is loading.
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Records an acknowledgement from `participant`.
    pub fn acknowledge(&mut self, participant: ParticipantId) -> AckOutcome {
        if !self.required.contains(&participant) {
            return AckOutcome::NotRequired;
        }
        if self.acked.insert(participant) {
            AckOutcome::Recorded
        } else {
            AckOutcome::Duplicate
        }
    }

    /// Drops a departed participant from the barrier.
    ///
    /// Removes it from both the required snapshot and (if it had already
    /// acknowledged) the acked set, so the expected count strictly
    /// decreases and the acknowledged set never grows on a disconnect.
    pub fn remove_participant(&mut self, participant: ParticipantId) {
        self.required.remove(&participant);
        self.acked.remove(&participant);
    }

    /// Whether every still-required participant has acknowledged.
    pub fn is_complete(&self) -> bool {
        self.acked.len() == self.required.len()
    }

    /// Participants the barrier is still sized for.
    pub fn expected_count(&self) -> usize {
        self.required.len()
    }

    /// Acknowledgements recorded so far.
    pub fn acked_count(&self) -> usize {
        self.acked.len()
    }
}
