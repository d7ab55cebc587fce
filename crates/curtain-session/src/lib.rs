//! Session wiring for Curtain nodes.
//!
//! This crate is the glue between the network and the local state
//! machines:
//!
//! - [`SessionController`] — one per node; maps inbound [`Signal`]s onto
//!   the local [`TransitionPlayer`](curtain_effect::TransitionPlayer)
//!   and, on the authority, the
//!   [`BarrierCoordinator`](curtain_barrier::BarrierCoordinator)
//! - [`ParticipantRoster`] — authority-side membership with scoped
//!   registration: joining hands back a [`RosterGuard`] whose drop
//!   deregisters the participant on every exit path, normal or not
//!
//! Like the barrier, the controller is pure: it returns the signals to
//! deliver and the command to run; the node event loop does the I/O.
//!
//! [`Signal`]: curtain_protocol::Signal

mod controller;
mod error;
mod roster;

pub use controller::{ControllerOutput, SessionController};
pub use error::SessionError;
pub use roster::{ParticipantRoster, RosterEvent, RosterGuard};
