//! A three-node synchronized scene handoff, all in one process.
//!
//! An authority and two followers share in-memory channels; each node
//! draws its cover value as a console bar. Run it and watch the three
//! screens fade out together, the "scene" swap on the authority, and
//! the three screens reveal together:
//!
//! ```text
//! cargo run -p lobby-handoff
//! ```

use std::sync::Arc;
use std::time::Duration;

use curtain::{AuthorityNode, FollowerNode, NodeConfig};
use curtain_barrier::{BarrierPhase, LoadError, SceneLoader, StagedScene};
use curtain_effect::{CoverSurface, EffectRegistry, FadeEffect};
use curtain_protocol::{EffectIndex, ResourceId};
use curtain_tick::{Easing, TickConfig};
use curtain_transport::memory;

// ---------------------------------------------------------------------------
// Demo collaborators
// ---------------------------------------------------------------------------

/// Pretends to load a scene: staging takes 400 ms, activation is instant.
struct DemoLoader;

impl SceneLoader for DemoLoader {
    async fn stage(
        &self,
        resource: &ResourceId,
    ) -> Result<StagedScene, LoadError> {
        tracing::info!(%resource, "staging scene");
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok(StagedScene::new(resource.clone()))
    }

    async fn activate(&self, staged: StagedScene) -> Result<(), LoadError> {
        tracing::info!(resource = %staged.resource(), "scene activated");
        Ok(())
    }
}

/// Prints the cover as a bar whenever it crosses a 10% step.
struct ConsoleSurface {
    label: &'static str,
    last_step: i32,
}

impl ConsoleSurface {
    fn new(label: &'static str) -> Box<Self> {
        Box::new(Self {
            label,
            last_step: -1,
        })
    }
}

impl CoverSurface for ConsoleSurface {
    fn set_cover(&mut self, cover: f32) {
        let step = (cover * 10.0).round() as i32;
        if step != self.last_step {
            self.last_step = step;
            let filled = "#".repeat(step.max(0) as usize);
            println!("{:>10} |{filled:<10}| {cover:.1}", self.label);
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Every node registers the same effects in the same order.
    let registry = Arc::new(EffectRegistry::new(vec![
        Arc::new(FadeEffect::new(Duration::from_millis(600))),
        Arc::new(
            FadeEffect::new(Duration::from_millis(1200))
                .with_easing(Easing::SmoothStep),
        ),
    ])?);

    let config = NodeConfig {
        tick: TickConfig::with_rate(30),
        ..Default::default()
    };

    let (listener, connector) = memory::listener();

    let (node, authority) = AuthorityNode::new(
        listener,
        DemoLoader,
        Arc::clone(&registry),
        config.clone(),
    );
    tokio::spawn(node.with_surface(ConsoleSurface::new("authority")).run());

    for label in ["follower-2", "follower-3"] {
        let (node, _handle) = FollowerNode::join(
            connector.connect()?,
            Arc::clone(&registry),
            config.clone(),
        )
        .await?;
        tokio::spawn(node.with_surface(ConsoleSurface::new(label)).run());
    }

    // First handoff: the stock fade.
    run_transition(&authority, "Hub").await?;

    // Switch everyone to the slow smoothstep fade, then hand off again.
    authority.request_effect_change(EffectIndex(1))?;
    run_transition(&authority, "Dungeon").await?;

    authority.shutdown()?;
    Ok(())
}

/// Requests a transition and waits for the release plus the reveal.
async fn run_transition(
    authority: &curtain::AuthorityHandle,
    resource: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== transition to {resource} ===");

    let mut barrier = authority.barrier_phase();
    authority.request_transition(resource).await?;
    barrier.wait_for(|p| *p != BarrierPhase::Idle).await?;
    barrier.wait_for(|p| *p == BarrierPhase::Idle).await?;

    let mut player = authority.player_phase();
    player
        .wait_for(|p| *p == curtain_effect::PlayerPhase::Idle)
        .await?;

    // Give the followers' reveals a beat to finish printing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}
