//! The fixed, ordered effect registry.

use std::sync::Arc;

use curtain_protocol::EffectIndex;

use crate::{EffectError, FadeEffect, TransitionEffect};

/// The pre-registered, ordered list of available transition effects.
///
/// Every node builds the same registry in the same order at startup;
/// that shared ordering is what lets an [`EffectIndex`] name an effect
/// network-wide. The registry is immutable after construction — effect
/// *selection* changes at runtime, the list never does.
pub struct EffectRegistry {
    effects: Vec<Arc<dyn TransitionEffect>>,
}

impl EffectRegistry {
    /// Builds a registry from an ordered effect list.
    ///
    /// # Errors
    /// Returns [`EffectError::EmptyRegistry`] if `effects` is empty —
    /// index 0 is the network-wide default selection and must exist.
    pub fn new(
        effects: Vec<Arc<dyn TransitionEffect>>,
    ) -> Result<Self, EffectError> {
        if effects.is_empty() {
            return Err(EffectError::EmptyRegistry);
        }
        Ok(Self { effects })
    }

    /// A registry holding only the stock quarter-second fade.
    pub fn with_default_fade() -> Self {
        Self {
            effects: vec![Arc::new(FadeEffect::default())],
        }
    }

    /// Resolves an index to its effect, if registered.
    pub fn get(
        &self,
        index: EffectIndex,
    ) -> Option<&Arc<dyn TransitionEffect>> {
        self.effects.get(index.0)
    }

    /// Whether the index resolves to a registered effect.
    pub fn is_valid(&self, index: EffectIndex) -> bool {
        index.0 < self.effects.len()
    }

    /// Number of registered effects (always ≥ 1).
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}
