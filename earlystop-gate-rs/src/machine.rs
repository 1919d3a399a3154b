//! Decision state machine.
//!
//! [`DecisionMachine`] owns the loss history and the decision state of one
//! monitored loss stream, and holds a handle to the channel that carries the
//! latest validation loss. Two states exist:
//!
//! ```text
//! MONITORING (stop = false) ──(comparison > threshold)──▶ STOPPED (stop = true)
//! ```
//!
//! STOPPED is terminal: nothing resets the flag within a run.
//!
//! # Decision Check
//!
//! With window size k, the check computes
//!
//! ```text
//! ratio      = k * median / (sum_last_k - k * median)
//! comparison = ratio * (validation_loss - minimum) / (lamina * minimum)
//! ```
//!
//! where `median` and `sum_last_k` cover the last k training losses and
//! `minimum` covers every training loss of the run. By default the check runs
//! on every k-th training sample; see [`CheckTrigger`] for the alternative.
//!
//! # Example
//!
//! ```rust
//! use earlystop_gate_rs::channel::SharedChannel;
//! use earlystop_gate_rs::config::EarlyStopConfig;
//! use earlystop_gate_rs::machine::DecisionMachine;
//!
//! let channel = SharedChannel::new();
//! let mut machine = DecisionMachine::new(EarlyStopConfig::new(0.1, 1.0, 4), channel).unwrap();
//!
//! machine.observe_validation(5.0).unwrap();
//! for loss in [10.0, 8.0, 6.0, 4.0] {
//!     machine.observe_training(loss);
//! }
//!
//! assert_eq!(machine.state().comparison_value, -2.0);
//! assert!(!machine.is_stopped());
//! ```

use serde::{Deserialize, Serialize};

use crate::channel::{SharedChannel, ValidationChannel};
use crate::checkpoint::MachineCheckpoint;
use crate::config::{CheckTrigger, EarlyStopConfig, SingularityPolicy};
use crate::error::{EarlyStopError, EarlyStopResult, SingularTerm};
use crate::gate::GateSignal;
use crate::history::LossHistory;
use crate::report::{CheckOutcome, DecisionReport, SkipReason};
use crate::stats::{self, WindowStats};

/// Decision state of one monitored stream.
///
/// The statistics fields hold the values of the most recent evaluated check
/// and are exposed for logging; only `stop` gates anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionState {
    /// Latched stop flag.
    pub stop: bool,

    /// Global minimum at the last check.
    #[serde(with = "crate::float_serde")]
    pub minimum: f32,

    /// Windowed upper median at the last check.
    #[serde(with = "crate::float_serde")]
    pub median: f32,

    /// Windowed sum at the last check.
    #[serde(with = "crate::float_serde")]
    pub sum_last_k: f32,

    /// Comparison value at the last check.
    #[serde(with = "crate::float_serde")]
    pub comparison_value: f32,

    /// Number of evaluated checks.
    pub checks_performed: u64,

    /// Training sample count at which `stop` latched.
    pub stopped_at: Option<u64>,
}

/// Terms of the comparison formula for one check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// `k * median / (sum_last_k - k * median)`.
    pub ratio: f32,
    /// Final comparison value.
    pub value: f32,
    /// First denominator found to be zero, if any.
    pub singularity: Option<SingularTerm>,
}

/// Evaluates the comparison formula.
///
/// Under [`SingularityPolicy::Propagate`] zero denominators follow IEEE
/// arithmetic and are only noted in [`Comparison::singularity`].
///
/// # Errors
///
/// Under [`SingularityPolicy::Hold`] a zero denominator yields
/// [`EarlyStopError::DivisionSingularity`].
pub fn compare(
    stats: &WindowStats,
    k: usize,
    validation_loss: f32,
    lamina: f32,
    policy: SingularityPolicy,
) -> EarlyStopResult<Comparison> {
    let k_median = k as f32 * stats.median;
    let spread = stats.sum_last_k - k_median;
    let scaled_minimum = lamina * stats.minimum;

    let singular = if spread == 0.0 {
        Some((SingularTerm::WindowSpread, spread))
    } else if scaled_minimum == 0.0 {
        Some((SingularTerm::ScaledMinimum, scaled_minimum))
    } else {
        None
    };

    if let (Some((term, denominator)), SingularityPolicy::Hold) = (singular, policy) {
        return Err(EarlyStopError::DivisionSingularity { term, denominator });
    }

    let ratio = k_median / spread;
    Ok(Comparison {
        ratio,
        value: ratio * (validation_loss - stats.minimum) / scaled_minimum,
        singularity: singular.map(|(term, _)| term),
    })
}

/// Early-stop decision machine for one monitored loss stream.
///
/// The host owns the machine and calls [`Self::observe_training`] once per
/// training iteration and [`Self::observe_validation`] once per validation
/// iteration. The channel is injected at construction; pass a clone of a
/// [`SharedChannel`] or a [`crate::channel::FileChannel`] depending on whether
/// validation and training share a process lifetime.
#[derive(Debug)]
pub struct DecisionMachine<C: ValidationChannel = SharedChannel> {
    config: EarlyStopConfig,
    history: LossHistory,
    state: DecisionState,
    channel: C,
}

impl<C: ValidationChannel> DecisionMachine<C> {
    /// Creates a machine in the MONITORING state.
    ///
    /// # Errors
    ///
    /// Returns [`EarlyStopError::ConfigError`] if the configuration is invalid.
    pub fn new(config: EarlyStopConfig, channel: C) -> EarlyStopResult<Self> {
        config.validate()?;
        Ok(Self {
            history: LossHistory::new(config.time_interval),
            config,
            state: DecisionState::default(),
            channel,
        })
    }

    /// Rebuilds a machine from a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint configuration is invalid or its
    /// history does not match the configured window.
    pub fn restore(checkpoint: MachineCheckpoint, channel: C) -> EarlyStopResult<Self> {
        checkpoint.config.validate()?;
        let history = LossHistory::from_parts(
            checkpoint.config.time_interval,
            checkpoint.window,
            checkpoint.sample_count,
            checkpoint.minimum,
        )?;

        tracing::info!(
            samples = checkpoint.sample_count,
            stop = checkpoint.state.stop,
            "restored early-stop machine from checkpoint"
        );

        Ok(Self {
            config: checkpoint.config,
            history,
            state: checkpoint.state,
            channel,
        })
    }

    /// Captures the machine state for persistence.
    #[must_use]
    pub fn checkpoint(&self) -> MachineCheckpoint {
        MachineCheckpoint::new(
            self.config.clone(),
            self.history.window(),
            self.history.len(),
            self.history.minimum(),
            self.state.clone(),
        )
    }

    /// Records one training loss and runs the decision check when it is due.
    pub fn observe_training(&mut self, loss: f32) -> CheckOutcome {
        if !loss.is_finite() {
            tracing::warn!(loss, sample = self.history.len() + 1, "non-finite training loss");
        }

        self.history.append(loss);
        let count = self.history.len();
        tracing::debug!(loss, sample = count, "training loss recorded");

        let k = self.config.time_interval as u64;
        if self.config.check_trigger == CheckTrigger::TrainingInterval && count % k == 0 {
            self.run_check()
        } else {
            CheckOutcome::NotDue
        }
    }

    /// Forwards one validation loss to the channel.
    ///
    /// With [`CheckTrigger::OnValidation`] the decision check also runs here
    /// once at least k training samples exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel write fails.
    pub fn observe_validation(&mut self, loss: f32) -> EarlyStopResult<CheckOutcome> {
        self.channel.write(loss)?;
        tracing::debug!(loss, "validation loss written to channel");

        let k = self.config.time_interval as u64;
        if self.config.check_trigger == CheckTrigger::OnValidation && self.history.len() >= k {
            Ok(self.run_check())
        } else {
            Ok(CheckOutcome::NotDue)
        }
    }

    fn run_check(&mut self) -> CheckOutcome {
        let count = self.history.len();

        let validation_loss = match self.channel.read() {
            Ok(value) => value,
            Err(EarlyStopError::ChannelEmpty) => {
                tracing::debug!(sample = count, "decision check skipped: no validation loss yet");
                return CheckOutcome::Skipped(SkipReason::ChannelEmpty);
            }
            Err(e) => {
                tracing::warn!(
                    sample = count,
                    error = %e,
                    "decision check skipped: channel unreadable"
                );
                return CheckOutcome::Skipped(SkipReason::ChannelUnavailable(e.to_string()));
            }
        };

        let stats = match self.window_stats() {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(sample = count, error = %e, "decision check skipped");
                return CheckOutcome::Skipped(SkipReason::InsufficientHistory {
                    available: count,
                    required: self.config.time_interval,
                });
            }
        };

        let comparison = compare(
            &stats,
            self.config.time_interval,
            validation_loss,
            self.config.lamina,
            self.config.singularity_policy,
        );

        self.state.minimum = stats.minimum;
        self.state.median = stats.median;
        self.state.sum_last_k = stats.sum_last_k;
        self.state.checks_performed += 1;

        let (ratio, singularity, exceeded) = match comparison {
            Ok(c) => {
                self.state.comparison_value = c.value;
                if let Some(term) = c.singularity {
                    tracing::warn!(
                        sample = count,
                        %term,
                        value = c.value,
                        "division singularity propagated"
                    );
                }
                (c.ratio, c.singularity, c.value > self.config.threshold)
            }
            Err(e) => {
                tracing::warn!(sample = count, error = %e, "holding decision");
                self.state.comparison_value = f32::NAN;
                (f32::NAN, e.singular_term(), false)
            }
        };

        let transitioned = exceeded && !self.state.stop;
        if transitioned {
            self.state.stop = true;
            self.state.stopped_at = Some(count);
        }

        tracing::info!(
            sample = count,
            validation_loss,
            minimum = stats.minimum,
            median = stats.median,
            sum_last_k = stats.sum_last_k,
            comparison = self.state.comparison_value,
            stop = self.state.stop,
            "decision check"
        );
        if transitioned {
            tracing::info!(sample = count, "sub-task should be terminated; gradient gate closed");
        }

        CheckOutcome::Evaluated(DecisionReport {
            sample_count: count,
            validation_loss,
            minimum: stats.minimum,
            median: stats.median,
            sum_last_k: stats.sum_last_k,
            ratio,
            comparison_value: self.state.comparison_value,
            threshold: self.config.threshold,
            singularity,
            stop: self.state.stop,
            transitioned,
        })
    }

    fn window_stats(&self) -> EarlyStopResult<WindowStats> {
        let minimum = self
            .history
            .minimum()
            .ok_or(EarlyStopError::PreconditionViolation {
                operation: "find_min",
                required: 1,
                available: 0,
            })?;
        let window = self.history.window();
        if window.len() < self.config.time_interval {
            return Err(EarlyStopError::PreconditionViolation {
                operation: "window_stats",
                required: self.config.time_interval,
                available: window.len(),
            });
        }
        stats::window_stats(&window, minimum)
    }

    /// Gating value for the backward pass.
    #[must_use]
    pub fn gate(&self) -> GateSignal {
        GateSignal::for_state(&self.state)
    }

    /// Returns whether the stop flag has latched.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.stop
    }

    /// Current decision state.
    #[must_use]
    pub fn state(&self) -> &DecisionState {
        &self.state
    }

    /// Training loss history.
    #[must_use]
    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    /// Number of training samples observed.
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.history.len()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EarlyStopConfig {
        &self.config
    }

    /// The injected validation channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }
}
