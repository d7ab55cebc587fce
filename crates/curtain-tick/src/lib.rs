//! Cooperative timing primitives for Curtain.
//!
//! Two pieces, both built for single-threaded node event loops:
//!
//! - [`TickScheduler`] — a fixed-timestep scheduler that sits inside a
//!   node's `tokio::select!` loop and wakes it at a configurable rate.
//! - [`Tween`] — a deterministic timed interpolation task: given a
//!   duration and an [`Easing`], it produces values in `0.0..=1.0`
//!   advanced purely by external ticks, and reports completion exactly
//!   once. This is what effect playback runs on.
//!
//! Keeping the wall clock confined to the scheduler (and out of the
//! tween) is what makes transition playback deterministic under test:
//! feed a tween fixed `dt`s and it always produces the same sequence.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(envelope) = inbound.recv() => { /* handle signals */ }
//!         tick = scheduler.wait_for_tick() => {
//!             controller.tick(tick.dt, surface.as_deref_mut());
//!         }
//!     }
//! }
//! ```

mod scheduler;
mod tween;

pub use scheduler::{Tick, TickConfig, TickScheduler};
pub use tween::{Easing, Progress, Tween};
