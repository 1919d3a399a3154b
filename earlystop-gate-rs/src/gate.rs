//! Binary gradient gate.
//!
//! During the backward pass the gate replaces the gradient with respect to the
//! monitored loss by a unit on/off signal: `1` while monitoring, `0` once the
//! stop flag has latched. Upstream parameters therefore receive either a
//! full-magnitude pass-through signal or nothing at all.

use serde::{Deserialize, Serialize};

use crate::machine::DecisionState;

/// Gating value emitted in place of the true gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateSignal {
    /// Updates continue; the gate emits `1`.
    Propagate,
    /// Updates are frozen; the gate emits `0`.
    Suppress,
}

impl GateSignal {
    /// Signal for a given stop flag.
    #[must_use]
    pub fn from_stop(stop: bool) -> Self {
        if stop {
            Self::Suppress
        } else {
            Self::Propagate
        }
    }

    /// Signal derived from the decision state.
    #[must_use]
    pub fn for_state(state: &DecisionState) -> Self {
        Self::from_stop(state.stop)
    }

    /// Numeric value written to the gradient slot.
    #[must_use]
    pub fn value(self) -> f32 {
        match self {
            Self::Propagate => 1.0,
            Self::Suppress => 0.0,
        }
    }

    /// Returns whether upstream updates continue.
    #[must_use]
    pub fn propagates(self) -> bool {
        matches!(self, Self::Propagate)
    }

    /// Writes the gating value into the designated gradient slot.
    pub fn write_to(self, slot: &mut f32) {
        *slot = self.value();
    }
}
