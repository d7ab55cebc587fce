//! Whole-node integration tests: authority + followers over in-memory
//! channels, with paused tokio time driving the tick loops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use curtain::{AuthorityNode, FollowerNode, NodeConfig};
use curtain_barrier::{BarrierPhase, LoadError, SceneLoader, StagedScene};
use curtain_effect::{
    CoverSurface, EffectRegistry, FadeEffect, PlayerPhase,
};
use curtain_protocol::{EffectIndex, ResourceId};
use curtain_tick::TickConfig;
use curtain_transport::memory;

// ---------------------------------------------------------------------------
// Test collaborators
// ---------------------------------------------------------------------------

/// Counts stage/activate calls; takes 50 ms per stage.
#[derive(Clone, Default)]
struct CountingLoader {
    stages: Arc<AtomicUsize>,
    activations: Arc<AtomicUsize>,
}

impl SceneLoader for CountingLoader {
    async fn stage(
        &self,
        resource: &ResourceId,
    ) -> Result<StagedScene, LoadError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.stages.fetch_add(1, Ordering::SeqCst);
        Ok(StagedScene::new(resource.clone()))
    }

    async fn activate(
        &self,
        _staged: StagedScene,
    ) -> Result<(), LoadError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Always fails to stage.
struct BrokenLoader;

impl SceneLoader for BrokenLoader {
    async fn stage(
        &self,
        resource: &ResourceId,
    ) -> Result<StagedScene, LoadError> {
        Err(LoadError::NotFound(resource.clone()))
    }

    async fn activate(
        &self,
        _staged: StagedScene,
    ) -> Result<(), LoadError> {
        unreachable!("staging never succeeds")
    }
}

/// Records every cover value, shared with the test.
#[derive(Clone, Default)]
struct SharedSurface(Arc<Mutex<Vec<f32>>>);

impl CoverSurface for SharedSurface {
    fn set_cover(&mut self, cover: f32) {
        self.0.lock().unwrap().push(cover);
    }
}

fn registry() -> Arc<EffectRegistry> {
    Arc::new(
        EffectRegistry::new(vec![
            Arc::new(FadeEffect::new(Duration::from_millis(100))),
            Arc::new(FadeEffect::new(Duration::from_millis(50))),
        ])
        .unwrap(),
    )
}

fn config() -> NodeConfig {
    NodeConfig {
        tick: TickConfig {
            rate_hz: 40,
            start_jitter_us: 0,
        },
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_three_node_transition_over_channels() {
    let (listener, connector) = memory::listener();
    let loader = CountingLoader::default();
    let registry = registry();

    let (node, authority) = AuthorityNode::new(
        listener,
        loader.clone(),
        Arc::clone(&registry),
        config(),
    );
    tokio::spawn(node.run());

    let surface_2 = SharedSurface::default();
    let (follower_2, handle_2) = FollowerNode::join(
        connector.connect().unwrap(),
        Arc::clone(&registry),
        config(),
    )
    .await
    .unwrap();
    tokio::spawn(
        follower_2.with_surface(Box::new(surface_2.clone())).run(),
    );

    let (follower_3, handle_3) = FollowerNode::join(
        connector.connect().unwrap(),
        Arc::clone(&registry),
        config(),
    )
    .await
    .unwrap();
    tokio::spawn(follower_3.run());

    let mut barrier = authority.barrier_phase();
    authority.request_transition("LevelB").await.unwrap();

    // Barrier opens, everyone covers, the load runs, everyone releases.
    barrier
        .wait_for(|p| *p != BarrierPhase::Idle)
        .await
        .unwrap();
    barrier
        .wait_for(|p| *p == BarrierPhase::Idle)
        .await
        .unwrap();

    assert_eq!(loader.stages.load(Ordering::SeqCst), 1);
    assert_eq!(loader.activations.load(Ordering::SeqCst), 1);

    // Every node finishes its reveal and returns to Idle.
    let mut player = authority.player_phase();
    player.wait_for(|p| *p == PlayerPhase::Idle).await.unwrap();
    let mut player = handle_2.player_phase();
    player.wait_for(|p| *p == PlayerPhase::Idle).await.unwrap();
    let mut player = handle_3.player_phase();
    player.wait_for(|p| *p == PlayerPhase::Idle).await.unwrap();

    // The fade actually drove the follower's surface: covers rise to
    // 1.0 on the way out and come back down to 0.0 on the reveal.
    let covers = surface_2.0.lock().unwrap();
    assert!(!covers.is_empty());
    assert!(covers.iter().any(|c| *c >= 1.0));
    assert_eq!(*covers.last().unwrap(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_effect_change_round_trip_over_channels() {
    let (listener, connector) = memory::listener();
    let loader = CountingLoader::default();
    let registry = registry();

    let (node, authority) = AuthorityNode::new(
        listener,
        loader.clone(),
        Arc::clone(&registry),
        config(),
    );
    tokio::spawn(node.run());

    let (follower, handle) = FollowerNode::join(
        connector.connect().unwrap(),
        Arc::clone(&registry),
        config(),
    )
    .await
    .unwrap();
    tokio::spawn(follower.run());

    // The follower asks for effect 1; the authority validates and
    // rebroadcasts. Selection is advisory and barrier-independent, so a
    // full transition afterwards proves both nodes still agree.
    handle.request_effect_change(EffectIndex(1)).unwrap();

    let mut barrier = authority.barrier_phase();
    authority.request_transition("LevelC").await.unwrap();
    barrier
        .wait_for(|p| *p != BarrierPhase::Idle)
        .await
        .unwrap();
    barrier
        .wait_for(|p| *p == BarrierPhase::Idle)
        .await
        .unwrap();

    let mut player = handle.player_phase();
    player.wait_for(|p| *p == PlayerPhase::Idle).await.unwrap();
    assert_eq!(loader.stages.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_keeps_followers_covered() {
    let (listener, connector) = memory::listener();
    let registry = registry();

    let (node, authority) = AuthorityNode::new(
        listener,
        BrokenLoader,
        Arc::clone(&registry),
        config(),
    );
    tokio::spawn(node.run());

    let (follower, handle) = FollowerNode::join(
        connector.connect().unwrap(),
        Arc::clone(&registry),
        config(),
    )
    .await
    .unwrap();
    tokio::spawn(follower.run());

    let mut barrier = authority.barrier_phase();
    authority.request_transition("Nowhere").await.unwrap();
    barrier
        .wait_for(|p| *p != BarrierPhase::Idle)
        .await
        .unwrap();
    barrier
        .wait_for(|p| *p == BarrierPhase::Idle)
        .await
        .unwrap();

    // The coordinator gave up, but no release went out: the follower is
    // still covered, and stays that way.
    let mut player = handle.player_phase();
    player
        .wait_for(|p| *p == PlayerPhase::WaitingForAuthority)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        *handle.player_phase().borrow(),
        PlayerPhase::WaitingForAuthority
    );

    // The coordinator itself is free again; retrying is the trigger's
    // business and a retry is accepted at the barrier.
    authority.request_transition("Elsewhere").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_second_transition_rejected_while_first_in_flight() {
    let (listener, connector) = memory::listener();
    let loader = CountingLoader::default();
    let registry = registry();

    let (node, authority) = AuthorityNode::new(
        listener,
        loader.clone(),
        Arc::clone(&registry),
        config(),
    );
    tokio::spawn(node.run());

    let (follower, _handle) = FollowerNode::join(
        connector.connect().unwrap(),
        Arc::clone(&registry),
        config(),
    )
    .await
    .unwrap();
    tokio::spawn(follower.run());

    authority.request_transition("LevelB").await.unwrap();
    let second = authority.request_transition("LevelC").await;
    assert!(second.is_err(), "second request must be rejected");

    let mut barrier = authority.barrier_phase();
    barrier
        .wait_for(|p| *p == BarrierPhase::Idle)
        .await
        .unwrap();
    assert_eq!(loader.stages.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_follower_departure_does_not_wedge_the_barrier() {
    let (listener, connector) = memory::listener();
    let loader = CountingLoader::default();
    let registry = registry();

    let (node, authority) = AuthorityNode::new(
        listener,
        loader.clone(),
        Arc::clone(&registry),
        config(),
    );
    tokio::spawn(node.run());

    let (follower_2, _handle_2) = FollowerNode::join(
        connector.connect().unwrap(),
        Arc::clone(&registry),
        config(),
    )
    .await
    .unwrap();
    tokio::spawn(follower_2.run());

    let (follower_3, handle_3) = FollowerNode::join(
        connector.connect().unwrap(),
        Arc::clone(&registry),
        config(),
    )
    .await
    .unwrap();
    let follower_3_task = tokio::spawn(follower_3.run());

    // Follower 3 goes away entirely. The sleep yields until the
    // authority's loop has drained the departure.
    handle_3.shutdown().unwrap();
    let _ = follower_3_task.await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The transition still completes with the remaining two.
    let mut barrier = authority.barrier_phase();
    authority.request_transition("LevelB").await.unwrap();
    barrier
        .wait_for(|p| *p != BarrierPhase::Idle)
        .await
        .unwrap();
    barrier
        .wait_for(|p| *p == BarrierPhase::Idle)
        .await
        .unwrap();
    assert_eq!(loader.stages.load(Ordering::SeqCst), 1);
}
