//! End-to-end transition flows at the controller level.
//!
//! No transport here: a tiny router delivers fanout and upstream batches
//! between an authority controller and its followers, and every node is
//! ticked in lockstep. This exercises the full protocol ordering without
//! any timing nondeterminism.

use std::sync::Arc;
use std::time::Duration;

use curtain_barrier::{BarrierCommand, BarrierPhase, LoadError};
use curtain_effect::{
    CoverSurface, EffectRegistry, FadeEffect, PlayerPhase,
};
use curtain_protocol::{EffectIndex, ParticipantId, Recipient, ResourceId};
use curtain_session::{ControllerOutput, SessionController};

const DT: Duration = Duration::from_millis(25);

struct NullSurface;
impl CoverSurface for NullSurface {
    fn set_cover(&mut self, _cover: f32) {}
}

/// An authority and N-1 followers with every signal routed in-process.
struct Cluster {
    authority: SessionController,
    followers: Vec<SessionController>,
    /// Load commands observed, in order.
    loads: Vec<ResourceId>,
}

impl Cluster {
    /// Participant 1 is the authority; 2..=n are followers.
    fn new(n: u64) -> Self {
        let registry = Arc::new(
            EffectRegistry::new(vec![
                Arc::new(FadeEffect::new(Duration::from_millis(100))),
                Arc::new(FadeEffect::new(Duration::from_millis(50))),
                Arc::new(FadeEffect::new(Duration::from_millis(200))),
            ])
            .unwrap(),
        );

        let mut authority =
            SessionController::authority(ParticipantId(1), Arc::clone(&registry));
        authority.participant_joined(ParticipantId(1));

        let mut followers = Vec::new();
        for id in 2..=n {
            authority.participant_joined(ParticipantId(id));
            followers.push(SessionController::follower(
                ParticipantId(id),
                Arc::clone(&registry),
            ));
        }

        Self {
            authority,
            followers,
            loads: Vec::new(),
        }
    }

    fn follower(&self, id: u64) -> &SessionController {
        self.followers
            .iter()
            .find(|f| f.participant() == ParticipantId(id))
            .expect("unknown follower")
    }

    fn drop_follower(&mut self, id: u64) -> ControllerOutput {
        self.followers
            .retain(|f| f.participant() != ParticipantId(id));
        self.authority.participant_left(ParticipantId(id))
    }

    /// Routes one controller output to its destinations, returning the
    /// outputs that produced in turn.
    fn route(
        &mut self,
        from: Option<ParticipantId>,
        output: ControllerOutput,
    ) -> Vec<(Option<ParticipantId>, ControllerOutput)> {
        let mut produced = Vec::new();

        if let Some(BarrierCommand::BeginLoad(resource)) = output.command {
            self.loads.push(resource);
        }

        for signal in output.upstream {
            let out = self.authority.handle_signal(from, signal);
            produced.push((Some(ParticipantId(1)), out));
        }

        for (recipient, signal) in output.fanout {
            let deliver_to_authority = !matches!(
                recipient,
                Recipient::Only(p) if p != ParticipantId(1)
            ) && !matches!(
                recipient,
                Recipient::AllExcept(p) if p == ParticipantId(1)
            );
            if deliver_to_authority {
                let out = self.authority.handle_signal(None, signal.clone());
                produced.push((Some(ParticipantId(1)), out));
            }

            for follower in &mut self.followers {
                let id = follower.participant();
                let hit = match recipient {
                    Recipient::All => true,
                    Recipient::Only(p) => p == id,
                    Recipient::AllExcept(p) => p != id,
                };
                if hit {
                    let out = follower.handle_signal(None, signal.clone());
                    produced.push((Some(id), out));
                }
            }
        }

        produced
    }

    /// Routes outputs transitively until the network is quiet.
    fn settle(&mut self, from: Option<ParticipantId>, output: ControllerOutput) {
        let mut queue = vec![(from, output)];
        while let Some((from, output)) = queue.pop() {
            queue.extend(self.route(from, output));
        }
    }

    /// Advances every node by one tick and routes whatever that yields.
    fn tick_all(&mut self) {
        let mut surface = NullSurface;

        let out = self.authority.tick(DT, Some(&mut surface));
        self.settle(Some(ParticipantId(1)), out);

        let ids: Vec<ParticipantId> =
            self.followers.iter().map(|f| f.participant()).collect();
        for id in ids {
            let out = self
                .followers
                .iter_mut()
                .find(|f| f.participant() == id)
                .unwrap()
                .tick(DT, Some(&mut surface));
            self.settle(Some(id), out);
        }
    }

    fn tick_n(&mut self, n: usize) {
        for _ in 0..n {
            self.tick_all();
        }
    }

    fn request_transition(&mut self, resource: &str) {
        let out = self
            .authority
            .request_transition(ResourceId::new(resource))
            .expect("request accepted");
        self.settle(Some(ParticipantId(1)), out);
    }

    fn complete_load(&mut self) {
        let out = self.authority.load_complete();
        self.settle(Some(ParticipantId(1)), out);
    }

    fn authority_phase(&self) -> BarrierPhase {
        self.authority.coordinator().unwrap().phase()
    }
}

#[test]
fn test_three_participant_end_to_end() {
    let mut cluster = Cluster::new(3);

    cluster.request_transition("LevelB");
    assert_eq!(cluster.authority_phase(), BarrierPhase::CollectingAcks);

    // Everyone is covering.
    assert_eq!(
        cluster.authority.player().phase(),
        PlayerPhase::PlayingOut
    );
    assert_eq!(cluster.follower(2).player().phase(), PlayerPhase::PlayingOut);
    assert_eq!(cluster.follower(3).player().phase(), PlayerPhase::PlayingOut);

    // 100 ms fade at 25 ms ticks: four ticks to cover, acks flow, the
    // barrier closes, and exactly one load begins.
    cluster.tick_n(4);
    assert_eq!(cluster.loads, vec![ResourceId::new("LevelB")]);
    assert_eq!(cluster.authority_phase(), BarrierPhase::Loading);
    assert_eq!(
        cluster.follower(2).player().phase(),
        PlayerPhase::WaitingForAuthority
    );

    // Load lands; everyone reveals together.
    cluster.complete_load();
    assert_eq!(cluster.authority_phase(), BarrierPhase::Idle);
    assert_eq!(cluster.authority.player().phase(), PlayerPhase::PlayingIn);
    assert_eq!(cluster.follower(2).player().phase(), PlayerPhase::PlayingIn);
    assert_eq!(cluster.follower(3).player().phase(), PlayerPhase::PlayingIn);

    cluster.tick_n(4);
    assert_eq!(cluster.authority.player().phase(), PlayerPhase::Idle);
    assert_eq!(cluster.follower(2).player().phase(), PlayerPhase::Idle);
    assert_eq!(cluster.follower(3).player().phase(), PlayerPhase::Idle);

    // Exactly one load over the whole scenario.
    assert_eq!(cluster.loads.len(), 1);
}

#[test]
fn test_follower_disconnect_before_acking_shrinks_barrier() {
    let mut cluster = Cluster::new(3);

    cluster.request_transition("LevelB");
    assert_eq!(
        cluster.authority.coordinator().unwrap().expected_count(),
        Some(3)
    );

    // Participant 3 drops before ever acking.
    let out = cluster.drop_follower(3);
    cluster.settle(Some(ParticipantId(1)), out);
    assert_eq!(
        cluster.authority.coordinator().unwrap().expected_count(),
        Some(2)
    );

    // The remaining two finish covering; the barrier closes on their
    // acks alone.
    cluster.tick_n(4);
    assert_eq!(cluster.loads, vec![ResourceId::new("LevelB")]);
    assert_eq!(cluster.authority_phase(), BarrierPhase::Loading);
}

#[test]
fn test_load_failure_leaves_everyone_covered() {
    let mut cluster = Cluster::new(2);

    cluster.request_transition("Broken");
    cluster.tick_n(4);
    assert_eq!(cluster.authority_phase(), BarrierPhase::Loading);

    let out = cluster
        .authority
        .load_failed(&LoadError::NotFound(ResourceId::new("Broken")));
    cluster.settle(Some(ParticipantId(1)), out);

    // No release: every player is still waiting, screens covered.
    assert_eq!(cluster.authority_phase(), BarrierPhase::Idle);
    assert_eq!(
        cluster.authority.player().phase(),
        PlayerPhase::WaitingForAuthority
    );
    assert_eq!(
        cluster.follower(2).player().phase(),
        PlayerPhase::WaitingForAuthority
    );
}

#[test]
fn test_effect_selection_round_trip_applies_to_next_transition() {
    let mut cluster = Cluster::new(3);

    // Participant 2 asks for effect 2; the authority rebroadcasts.
    let out = cluster
        .followers
        .iter_mut()
        .find(|f| f.participant() == ParticipantId(2))
        .unwrap()
        .request_effect_change(EffectIndex(2));
    cluster.settle(Some(ParticipantId(2)), out);

    assert_eq!(
        cluster.authority.player().active_effect(),
        EffectIndex(2)
    );
    assert_eq!(
        cluster.follower(2).player().active_effect(),
        EffectIndex(2)
    );
    assert_eq!(
        cluster.follower(3).player().active_effect(),
        EffectIndex(2)
    );

    // The next transition uses it everywhere (200 ms fade → 8 ticks).
    cluster.request_transition("LevelC");
    cluster.tick_n(7);
    assert_eq!(cluster.authority_phase(), BarrierPhase::CollectingAcks);
    cluster.tick_n(1);
    assert_eq!(cluster.authority_phase(), BarrierPhase::Loading);
}

#[test]
fn test_transition_request_during_open_session_is_rejected() {
    let mut cluster = Cluster::new(2);

    cluster.request_transition("LevelB");
    let result = cluster
        .authority
        .request_transition(ResourceId::new("LevelC"));
    assert!(result.is_err());

    // The in-flight transition is unharmed.
    cluster.tick_n(4);
    cluster.complete_load();
    cluster.tick_n(4);
    assert_eq!(cluster.loads, vec![ResourceId::new("LevelB")]);
    assert_eq!(cluster.authority.player().phase(), PlayerPhase::Idle);
}

#[test]
fn test_back_to_back_transitions_after_release() {
    let mut cluster = Cluster::new(2);

    for level in ["LevelB", "LevelC"] {
        cluster.request_transition(level);
        cluster.tick_n(4);
        cluster.complete_load();
        cluster.tick_n(4);
        assert_eq!(cluster.authority.player().phase(), PlayerPhase::Idle);
    }

    assert_eq!(
        cluster.loads,
        vec![ResourceId::new("LevelB"), ResourceId::new("LevelC")]
    );
}
