//! The transition barrier — Curtain's authority-side core.
//!
//! One node (the authority) decides when a transition starts and when the
//! new scene becomes visible. This crate is its bookkeeping:
//!
//! - [`BarrierCoordinator`] — the `Idle → CollectingAcks → Loading →
//!   Releasing → Idle` state machine that counts acknowledgements, gates
//!   the load, and releases everyone together
//! - [`TransitionSession`] — one in-flight transition attempt (at most
//!   one exists authority-wide)
//! - [`SceneLoader`] — the opaque stage-then-activate load collaborator
//!
//! The coordinator is a pure state machine: it performs no I/O and owns
//! no clock. Every operation returns the outbound signals and load
//! command the caller's event loop must carry out. That keeps the entire
//! ordering-sensitive path synchronously testable.

#![allow(async_fn_in_trait)]

mod coordinator;
mod error;
mod loader;
mod phase;
mod session;

pub use coordinator::{BarrierCommand, BarrierCoordinator, BarrierOutput};
pub use error::BarrierError;
pub use loader::{LoadError, SceneLoader, StagedScene};
pub use phase::BarrierPhase;
pub use session::{AckOutcome, TransitionSession};
