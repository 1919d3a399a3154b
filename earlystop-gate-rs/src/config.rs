//! Configuration for the early-stop decision engine.
//!
//! The three decision parameters (`threshold`, `lamina`, `time_interval`) are
//! required: they have no defaults and must be supplied by the host, either in
//! code or from a TOML file. The scheduling and numeric-policy knobs are
//! optional and default to the behavior described on each field.
//!
//! # Example
//!
//! ```rust
//! use earlystop_gate_rs::config::{CheckTrigger, EarlyStopConfig};
//!
//! // Required parameters only
//! let config = EarlyStopConfig::new(0.1, 1.0, 4);
//! assert!(config.validate().is_ok());
//!
//! // Builder for the optional knobs
//! let config = EarlyStopConfig::builder(0.1, 1.0, 4)
//!     .check_trigger(CheckTrigger::OnValidation)
//!     .build();
//!
//! // Loading from file
//! // let config = EarlyStopConfig::from_file("earlystop.toml")?;
//! ```
//!
//! A minimal TOML file:
//!
//! ```toml
//! threshold = 0.1
//! lamina = 1.0
//! time_interval = 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EarlyStopError, EarlyStopResult};

/// Configuration of one monitored loss stream.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `threshold` | required | Comparison cutoff; `comparison > threshold` stops |
/// | `lamina` | required | Normalization factor applied to the minimum |
/// | `time_interval` | required | Window size k and check period |
/// | `check_trigger` | `training_interval` | When the check runs |
/// | `singularity_policy` | `hold` | Handling of zero denominators |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStopConfig {
    /// Decision cutoff for the comparison value.
    #[serde(with = "crate::float_serde")]
    pub threshold: f32,

    /// Scale factor in the denominator `lamina * minimum`.
    ///
    /// Expected to be non-zero; a zero value is reported by [`Self::validate`]
    /// as a warning and handled by the singularity policy at check time.
    #[serde(with = "crate::float_serde")]
    pub lamina: f32,

    /// Window size k: number of recent training samples used by the windowed
    /// statistics, and the period (in training samples) of the decision check.
    pub time_interval: usize,

    /// When the decision check runs.
    #[serde(default)]
    pub check_trigger: CheckTrigger,

    /// How a zero denominator in the comparison formula is handled.
    #[serde(default)]
    pub singularity_policy: SingularityPolicy,
}

/// Scheduling of the decision check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTrigger {
    /// Check on every k-th training sample, reading the last validation value.
    #[default]
    TrainingInterval,

    /// Check right after each validation write, once k training samples exist.
    OnValidation,
}

/// Handling of a vanishing denominator in the comparison formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingularityPolicy {
    /// Treat as insufficient signal: refresh statistics, leave `stop` unchanged.
    #[default]
    Hold,

    /// Evaluate with IEEE arithmetic; an infinite comparison can stop training.
    Propagate,
}

impl EarlyStopConfig {
    /// Creates a configuration with the required parameters and default knobs.
    #[must_use]
    pub fn new(threshold: f32, lamina: f32, time_interval: usize) -> Self {
        Self {
            threshold,
            lamina,
            time_interval,
            check_trigger: CheckTrigger::default(),
            singularity_policy: SingularityPolicy::default(),
        }
    }

    /// Creates a builder seeded with the required parameters.
    #[must_use]
    pub fn builder(threshold: f32, lamina: f32, time_interval: usize) -> EarlyStopConfigBuilder {
        EarlyStopConfigBuilder {
            config: Self::new(threshold, lamina, time_interval),
        }
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML or misses a required
    /// parameter.
    pub fn from_toml_str(content: &str) -> EarlyStopResult<Self> {
        toml::from_str(content).map_err(|e| EarlyStopError::ConfigError {
            detail: format!("Failed to parse config: {e}"),
        })
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> EarlyStopResult<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| EarlyStopError::ConfigError {
                detail: format!("Failed to read config file: {e}"),
            })?;

        Self::from_toml_str(&content)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> EarlyStopResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| EarlyStopError::ConfigError {
            detail: format!("Failed to serialize config: {e}"),
        })?;

        std::fs::write(path.as_ref(), content).map_err(|e| EarlyStopError::ConfigError {
            detail: format!("Failed to write config file: {e}"),
        })
    }

    /// Validates the configuration.
    ///
    /// `time_interval` must be at least 1 and `threshold` must not be NaN.
    /// A zero `lamina` is accepted with a warning.
    pub fn validate(&self) -> EarlyStopResult<()> {
        if self.time_interval == 0 {
            return Err(EarlyStopError::ConfigError {
                detail: "time_interval must be >= 1".to_string(),
            });
        }

        if self.threshold.is_nan() {
            return Err(EarlyStopError::ConfigError {
                detail: "threshold must not be NaN".to_string(),
            });
        }

        if self.lamina == 0.0 {
            tracing::warn!(
                lamina = self.lamina,
                "lamina is zero; every decision check will hit a division singularity"
            );
        }

        Ok(())
    }
}

/// Builder for [`EarlyStopConfig`].
#[derive(Debug, Clone)]
pub struct EarlyStopConfigBuilder {
    config: EarlyStopConfig,
}

impl EarlyStopConfigBuilder {
    /// Sets when the decision check runs.
    #[must_use]
    pub fn check_trigger(mut self, trigger: CheckTrigger) -> Self {
        self.config.check_trigger = trigger;
        self
    }

    /// Sets the division singularity policy.
    #[must_use]
    pub fn singularity_policy(mut self, policy: SingularityPolicy) -> Self {
        self.config.singularity_policy = policy;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> EarlyStopConfig {
        self.config
    }
}
