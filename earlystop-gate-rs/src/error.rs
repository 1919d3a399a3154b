//! Error types and check policies for the early-stop engine.
//!
//! Most failures in this crate are local to a single decision check and never
//! abort the host's training run. The worst observable effect of a skipped
//! check is a delayed stop decision. Only [`EarlyStopError::Arity`] is fatal to
//! the invocation that raised it, because it signals an integration bug in the
//! host loop.
//!
//! # Error Categories
//!
//! - **Host contract**: wrong number of values passed per invocation
//! - **Decision check**: empty channel, division singularity, short history
//! - **Configuration**: invalid or unreadable configuration
//! - **I/O**: channel persistence and checkpoint failures
//!
//! # Example
//!
//! ```rust
//! use earlystop_gate_rs::error::{CheckPolicy, EarlyStopError};
//!
//! let err = EarlyStopError::ChannelEmpty;
//! assert!(!err.is_fatal());
//! assert_eq!(err.policy(), CheckPolicy::SkipCheck);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for the early-stop engine.
#[derive(Debug, Error)]
pub enum EarlyStopError {
    /// The host supplied other than exactly one scalar per invocation.
    #[error("input must be a single value (got {got} values)")]
    Arity {
        /// Number of values actually supplied.
        got: usize,
    },

    /// A decision check ran before any validation value was written.
    #[error("validation channel is empty: no validation pass has run yet")]
    ChannelEmpty,

    /// A denominator of the comparison formula is zero.
    #[error("division singularity in {term}: denominator is {denominator}")]
    DivisionSingularity {
        /// Which denominator vanished.
        term: SingularTerm,
        /// The offending denominator value.
        denominator: f32,
    },

    /// Statistics were requested over a history shorter than the window.
    #[error("precondition violated: {operation} needs {required} samples, history has {available}")]
    PreconditionViolation {
        /// The statistic that was requested.
        operation: &'static str,
        /// Minimum number of samples required.
        required: usize,
        /// Number of samples available.
        available: usize,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {detail}")]
    ConfigError {
        /// Description of the configuration issue.
        detail: String,
    },

    /// The persistent channel could not be read or written.
    #[error("Channel I/O error at {path}: {reason}")]
    ChannelIo {
        /// Location of the backing record.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// Checkpoint save or load failed.
    #[error("Checkpoint error: {reason}")]
    CheckpointError {
        /// Description of the checkpoint failure.
        reason: String,
    },
}

/// Denominator terms of the comparison formula that can vanish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingularTerm {
    /// `sum_last_k - k * median`.
    WindowSpread,
    /// `lamina * minimum`.
    ScaledMinimum,
}

impl std::fmt::Display for SingularTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WindowSpread => f.write_str("sum_last_k - k * median"),
            Self::ScaledMinimum => f.write_str("lamina * minimum"),
        }
    }
}

/// What the decision machine does in response to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPolicy {
    /// Abandon the current invocation and surface the error to the host.
    FailInvocation,

    /// Skip this check round; the decision state is left untouched.
    SkipCheck,

    /// Record the statistics but leave `stop` as it was.
    HoldDecision,

    /// Surface the error to the caller without touching decision state.
    Report,
}

impl EarlyStopError {
    /// Returns whether this error must abort the invocation that raised it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self.policy(), CheckPolicy::FailInvocation)
    }

    /// Returns the vanished denominator for a division singularity.
    #[must_use]
    pub fn singular_term(&self) -> Option<SingularTerm> {
        match self {
            Self::DivisionSingularity { term, .. } => Some(*term),
            _ => None,
        }
    }

    /// Returns the policy the decision machine applies for this error.
    #[must_use]
    pub fn policy(&self) -> CheckPolicy {
        match self {
            Self::Arity { .. } => CheckPolicy::FailInvocation,
            Self::ChannelEmpty | Self::PreconditionViolation { .. } => CheckPolicy::SkipCheck,
            Self::DivisionSingularity { .. } => CheckPolicy::HoldDecision,
            Self::ConfigError { .. } | Self::ChannelIo { .. } | Self::CheckpointError { .. } => {
                CheckPolicy::Report
            }
        }
    }
}

/// Result type for early-stop operations.
pub type EarlyStopResult<T> = Result<T, EarlyStopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_arity_is_fatal() {
        assert!(EarlyStopError::Arity { got: 3 }.is_fatal());
        assert!(!EarlyStopError::ChannelEmpty.is_fatal());
        assert!(!EarlyStopError::DivisionSingularity {
            term: SingularTerm::ScaledMinimum,
            denominator: 0.0,
        }
        .is_fatal());
        assert!(!EarlyStopError::PreconditionViolation {
            operation: "find_median",
            required: 4,
            available: 2,
        }
        .is_fatal());
    }

    #[test]
    fn test_arity_message() {
        let err = EarlyStopError::Arity { got: 0 };
        assert_eq!(err.to_string(), "input must be a single value (got 0 values)");
    }

    #[test]
    fn test_singularity_message_names_term() {
        let err = EarlyStopError::DivisionSingularity {
            term: SingularTerm::WindowSpread,
            denominator: 0.0,
        };
        assert!(err.to_string().contains("sum_last_k - k * median"));
        assert_eq!(err.policy(), CheckPolicy::HoldDecision);
        assert_eq!(err.singular_term(), Some(SingularTerm::WindowSpread));
        assert_eq!(EarlyStopError::ChannelEmpty.singular_term(), None);
    }

    #[test]
    fn test_io_errors_are_reported() {
        let err = EarlyStopError::ChannelIo {
            path: "/tmp/slot.json".to_string(),
            reason: "denied".to_string(),
        };
        assert_eq!(err.policy(), CheckPolicy::Report);
    }
}
