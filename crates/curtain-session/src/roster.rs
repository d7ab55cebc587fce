//! Authority-side participant membership.

use curtain_protocol::ParticipantId;
use tokio::sync::mpsc;
use tracing::trace;

/// A membership change, delivered to the authority's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterEvent {
    /// A participant registered.
    Joined(ParticipantId),
    /// A participant's [`RosterGuard`] was dropped.
    Left(ParticipantId),
}

/// Assigns participant identities and reports membership changes.
///
/// Registration is scoped: [`register`](Self::register) returns a
/// [`RosterGuard`] alongside the new id, and dropping the guard emits
/// the matching [`RosterEvent::Left`]. Connection handler tasks hold the
/// guard for their lifetime, so deregistration happens on *every* exit
/// path — clean close, decode error, or panic — without any handler
/// remembering to call it.
///
/// Ids are assigned from a monotonically increasing counter and never
/// reused; a stale ack from a long-gone participant can never be
/// mistaken for a new one.
pub struct ParticipantRoster {
    next_id: u64,
    events: mpsc::UnboundedSender<RosterEvent>,
}

impl ParticipantRoster {
    /// Creates a roster and the event stream its guards report into.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RosterEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self { next_id: 1, events },
            rx,
        )
    }

    /// Registers a new participant.
    pub fn register(&mut self) -> (ParticipantId, RosterGuard) {
        let participant = ParticipantId(self.next_id);
        self.next_id += 1;

        trace!(%participant, "participant registered");
        let _ = self.events.send(RosterEvent::Joined(participant));

        (
            participant,
            RosterGuard {
                participant,
                events: self.events.clone(),
            },
        )
    }
}

/// Scoped registration: dropping the guard deregisters the participant.
#[derive(Debug)]
pub struct RosterGuard {
    participant: ParticipantId,
    events: mpsc::UnboundedSender<RosterEvent>,
}

impl RosterGuard {
    /// The registered participant's id.
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }
}

impl Drop for RosterGuard {
    fn drop(&mut self) {
        trace!(participant = %self.participant, "participant deregistered");
        // The receiver being gone means the node is shutting down; there
        // is nobody left to notify.
        let _ = self.events.send(RosterEvent::Left(self.participant));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let (mut roster, mut events) = ParticipantRoster::new();

        let (p1, g1) = roster.register();
        let (p2, g2) = roster.register();
        assert_ne!(p1, p2);

        drop(g1);
        let (p3, _g3) = roster.register();
        assert_ne!(p3, p1);
        assert_ne!(p3, p2);

        drop(g2);
        // Joined(1), Joined(2), Left(1), Joined(3), Left(2)
        assert_eq!(events.try_recv().unwrap(), RosterEvent::Joined(p1));
        assert_eq!(events.try_recv().unwrap(), RosterEvent::Joined(p2));
        assert_eq!(events.try_recv().unwrap(), RosterEvent::Left(p1));
        assert_eq!(events.try_recv().unwrap(), RosterEvent::Joined(p3));
        assert_eq!(events.try_recv().unwrap(), RosterEvent::Left(p2));
    }

    #[test]
    fn test_guard_drop_emits_left_even_inside_panic_unwind() {
        let (mut roster, mut events) = ParticipantRoster::new();
        let (p1, guard) = roster.register();

        let result = std::panic::catch_unwind(
            std::panic::AssertUnwindSafe(move || {
                let _held = guard;
                panic!("connection handler blew up");
            }),
        );
        assert!(result.is_err());

        assert_eq!(events.try_recv().unwrap(), RosterEvent::Joined(p1));
        assert_eq!(events.try_recv().unwrap(), RosterEvent::Left(p1));
    }
}
