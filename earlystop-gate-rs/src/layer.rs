//! Host-loop adapter.
//!
//! Hosts that drive the engine as a network layer call [`EarlyStopLayer::forward`]
//! with the loss as a one-element input and [`EarlyStopLayer::backward`] with
//! the one-element gradient slot. The forward output is the loss itself, so the
//! layer can sit in a graph without changing the value it monitors.

use serde::{Deserialize, Serialize};

use crate::channel::{SharedChannel, ValidationChannel};
use crate::error::{EarlyStopError, EarlyStopResult};
use crate::gate::GateSignal;
use crate::machine::DecisionMachine;
use crate::report::CheckOutcome;

/// Iteration mode of the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Parameter-updating pass; losses feed the history.
    Train,
    /// Reference pass; losses feed the channel.
    Validate,
}

impl Phase {
    /// Returns a human-readable name for the phase.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Validate => "validate",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a forward invocation.
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    /// The input loss, passed through unchanged.
    pub value: f32,
    /// What the machine did with it.
    pub outcome: CheckOutcome,
}

/// Layer wrapper around a [`DecisionMachine`].
#[derive(Debug)]
pub struct EarlyStopLayer<C: ValidationChannel = SharedChannel> {
    machine: DecisionMachine<C>,
}

impl<C: ValidationChannel> EarlyStopLayer<C> {
    /// Wraps a machine.
    #[must_use]
    pub fn new(machine: DecisionMachine<C>) -> Self {
        Self { machine }
    }

    /// Forward pass.
    ///
    /// # Errors
    ///
    /// Returns [`EarlyStopError::Arity`] unless `inputs` holds exactly one
    /// value, and propagates channel write failures in the validation phase.
    pub fn forward(&mut self, phase: Phase, inputs: &[f32]) -> EarlyStopResult<ForwardOutput> {
        let value = single(inputs)?;
        tracing::trace!(%phase, value, "forward");

        let outcome = match phase {
            Phase::Train => self.machine.observe_training(value),
            Phase::Validate => self.machine.observe_validation(value)?,
        };

        Ok(ForwardOutput { value, outcome })
    }

    /// Backward pass: overwrites the gradient slot with the gate value.
    ///
    /// # Errors
    ///
    /// Returns [`EarlyStopError::Arity`] unless `diff` holds exactly one slot.
    pub fn backward(&self, diff: &mut [f32]) -> EarlyStopResult<GateSignal> {
        let got = diff.len();
        let [slot] = diff else {
            return Err(EarlyStopError::Arity { got });
        };

        let signal = self.machine.gate();
        signal.write_to(slot);
        tracing::trace!(gate = signal.value(), "backward");
        Ok(signal)
    }

    /// The wrapped machine.
    #[must_use]
    pub fn machine(&self) -> &DecisionMachine<C> {
        &self.machine
    }

    /// Unwraps the machine.
    #[must_use]
    pub fn into_machine(self) -> DecisionMachine<C> {
        self.machine
    }
}

fn single(inputs: &[f32]) -> EarlyStopResult<f32> {
    match inputs {
        [value] => Ok(*value),
        _ => Err(EarlyStopError::Arity { got: inputs.len() }),
    }
}
