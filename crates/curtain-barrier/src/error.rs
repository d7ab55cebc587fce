//! Error types for the barrier layer.

use crate::BarrierPhase;

/// Errors that can occur during barrier operations.
#[derive(Debug, thiserror::Error)]
pub enum BarrierError {
    /// A transition was requested while another is still in flight. At
    /// most one session may be open authority-wide; the request is
    /// rejected with no state change.
    #[error("a transition session is already in flight (coordinator is {0})")]
    SessionInFlight(BarrierPhase),
}
