//! Core protocol types for Curtain's wire format.
//!
//! Everything in this module travels on the wire between the authority and
//! its followers. The shapes here ARE the protocol: a change to a serde
//! attribute is a wire-format change.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant node.
///
/// Assigned by the authority when a follower joins. The authority itself
/// occupies an id when it also plays the transition visually (by convention
/// id 1, assigned first).
///
/// `#[serde(transparent)]` keeps the wire shape a plain number: a
/// `ParticipantId(42)` serializes as `42`, not `{ "0": 42 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p-{}", self.0)
    }
}

/// An opaque identifier for the resource being loaded — typically a scene
/// name. The protocol never interprets it; only the authority's
/// `SceneLoader` does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Creates a resource id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An index into the fixed, pre-registered ordered list of transition
/// effects.
///
/// The list itself never travels on the wire — every node registers the
/// same effects in the same order at startup, so an index is enough to
/// name an effect network-wide. Indexes are validated against the registry
/// before they are acted on; an out-of-range index is rejected with no
/// state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectIndex(pub usize);

impl fmt::Display for EffectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fx-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient — who should receive a signal?
// ---------------------------------------------------------------------------

/// Specifies who should receive an outbound signal.
///
/// The coordinator and session controllers are pure state machines: they
/// return batches of `(Recipient, Signal)` pairs and the node event loop
/// does the actual delivery. `All` includes the authority's own local
/// controller — the authority is a participant too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every participant, including the authority's local controller.
    All,

    /// One specific participant.
    Only(ParticipantId),

    /// Everyone except the specified participant.
    AllExcept(ParticipantId),
}

// ---------------------------------------------------------------------------
// Signal — the transition protocol vocabulary
// ---------------------------------------------------------------------------

/// A protocol signal crossing the authority/participant boundary.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "StartTransition", "resource": "LevelB" }` — flat and easy
/// to inspect in logs or a browser devtools pane.
///
/// The transition protocol proper is six signals (`StartTransition`
/// through `RequestTransition`); `Join`/`Welcome`/`Disconnect` are the
/// membership handshake around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Signal {
    // -- Membership --

    /// Follower → authority: "let me in." Carries the protocol version so
    /// the authority can reject incompatible nodes at the door.
    Join { version: u32 },

    /// Authority → follower: "you're in, this is who you are."
    Welcome { participant: ParticipantId },

    /// Either direction: graceful close with a human-readable reason.
    Disconnect { reason: String },

    // -- Transition barrier --

    /// Authority → all: cover your screen, a load is coming.
    /// Drives each node's local `begin_out()`.
    StartTransition { resource: ResourceId },

    /// Participant → authority: "my screen is covered."
    /// Advances the authority's acknowledgement barrier.
    AckTransitionedOut { participant: ParticipantId },

    /// Authority → all: the new scene is active, reveal it.
    /// Drives each node's local `begin_in()`.
    Loaded,

    // -- Effect selection (independent of the barrier) --

    /// Authority → all: use this effect for the next transition.
    SetActiveEffect { index: EffectIndex },

    /// Participant → authority: "I'd like everyone to use this effect."
    /// The authority validates the index and rebroadcasts
    /// [`Signal::SetActiveEffect`] so every node's next transition matches.
    RequestEffectChange { index: EffectIndex },

    // -- External trigger --

    /// Trigger → authority: start a transition to this resource.
    /// Opens a new transition session if the coordinator is idle;
    /// rejected (dropped) while another transition is in flight.
    RequestTransition { resource: ResourceId },
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every message on the wire is an Envelope.
///
/// `seq` is a per-sender counter used to spot missing or reordered
/// messages when debugging a transport; the protocol itself relies on the
/// channel's ordering guarantee, not on `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Auto-incrementing sequence number, one counter per sender.
    pub seq: u64,

    /// Milliseconds since the sender's node started.
    pub timestamp: u64,

    /// The actual signal.
    pub signal: Signal,
}

// =========================================================================
// Tests
// =========================================================================
