//! Decision check reports and run-level collection.
//!
//! Every evaluated check produces a [`DecisionReport`] with the statistics,
//! the comparison value and the resulting `stop` flag. [`DecisionLog`]
//! accumulates reports over a run for JSON export and a console summary.
//! Reports are for observability only; nothing in the decision path reads
//! them back.

use serde::{Deserialize, Serialize};

use crate::error::SingularTerm;

/// Snapshot of one evaluated decision check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReport {
    /// Training samples appended when the check ran.
    pub sample_count: u64,

    /// Validation loss read from the channel.
    #[serde(with = "crate::float_serde")]
    pub validation_loss: f32,

    /// Global minimum of the training losses.
    #[serde(with = "crate::float_serde")]
    pub minimum: f32,

    /// Upper median of the last k training losses.
    #[serde(with = "crate::float_serde")]
    pub median: f32,

    /// Sum of the last k training losses.
    #[serde(with = "crate::float_serde")]
    pub sum_last_k: f32,

    /// `k * median / (sum_last_k - k * median)`.
    #[serde(with = "crate::float_serde")]
    pub ratio: f32,

    /// Final comparison value (NaN when a singularity was held).
    #[serde(with = "crate::float_serde")]
    pub comparison_value: f32,

    /// Threshold the comparison value was tested against.
    #[serde(with = "crate::float_serde")]
    pub threshold: f32,

    /// Denominator that vanished, if any.
    pub singularity: Option<SingularTerm>,

    /// Stop flag after this check.
    pub stop: bool,

    /// Whether this check latched the stop flag.
    pub transitioned: bool,
}

impl DecisionReport {
    /// Returns whether the comparison value exceeded the threshold.
    #[must_use]
    pub fn exceeded_threshold(&self) -> bool {
        self.comparison_value > self.threshold
    }
}

/// Why a scheduled check did not evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No validation loss has been written yet.
    ChannelEmpty,

    /// The channel exists but could not be read.
    ChannelUnavailable(String),

    /// Fewer than k training samples are available.
    InsufficientHistory {
        /// Samples available.
        available: u64,
        /// Window size k.
        required: usize,
    },
}

/// Result of feeding one observation to the decision machine.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// No check was scheduled for this observation.
    NotDue,

    /// A check was scheduled but skipped; decision state is unchanged.
    Skipped(SkipReason),

    /// A check ran.
    Evaluated(DecisionReport),
}

impl CheckOutcome {
    /// Returns the report if a check was evaluated.
    #[must_use]
    pub fn report(&self) -> Option<&DecisionReport> {
        match self {
            Self::Evaluated(report) => Some(report),
            _ => None,
        }
    }

    /// Returns whether this outcome latched the stop flag.
    #[must_use]
    pub fn transitioned(&self) -> bool {
        self.report().is_some_and(|r| r.transitioned)
    }
}

/// Aggregate counters over a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionStatistics {
    /// Checks that evaluated.
    pub checks_evaluated: u64,

    /// Checks skipped because the channel was empty or unreadable.
    pub checks_skipped: u64,

    /// Evaluated checks that hit a division singularity.
    pub singular_checks: u64,

    /// Sample count at which `stop` latched, if it did.
    pub stopped_at: Option<u64>,

    /// Last comparison value seen.
    #[serde(with = "crate::float_serde::option")]
    pub last_comparison: Option<f32>,
}

/// Collector for decision reports.
pub struct DecisionLog {
    /// Whether collection is enabled.
    enabled: bool,

    /// Evaluated reports, oldest first.
    reports: Vec<DecisionReport>,

    /// Maximum reports kept in memory.
    max_reports: usize,

    /// Running statistics.
    statistics: DecisionStatistics,
}

impl DecisionLog {
    /// Creates a collector keeping up to 10 000 reports.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self::with_capacity(enabled, 10_000)
    }

    /// Creates a collector keeping up to `max_reports` reports.
    #[must_use]
    pub fn with_capacity(enabled: bool, max_reports: usize) -> Self {
        Self {
            enabled,
            reports: Vec::new(),
            max_reports: max_reports.max(1),
            statistics: DecisionStatistics::default(),
        }
    }

    /// Records the outcome of one observation.
    pub fn record(&mut self, outcome: &CheckOutcome) {
        if !self.enabled {
            return;
        }

        match outcome {
            CheckOutcome::NotDue => {}
            CheckOutcome::Skipped(_) => self.statistics.checks_skipped += 1,
            CheckOutcome::Evaluated(report) => {
                self.statistics.checks_evaluated += 1;
                if report.singularity.is_some() {
                    self.statistics.singular_checks += 1;
                }
                if report.transitioned {
                    self.statistics.stopped_at = Some(report.sample_count);
                }
                self.statistics.last_comparison = Some(report.comparison_value);

                if self.reports.len() == self.max_reports {
                    self.reports.remove(0);
                }
                self.reports.push(report.clone());
            }
        }
    }

    /// Reports currently held, oldest first.
    #[must_use]
    pub fn reports(&self) -> &[DecisionReport] {
        &self.reports
    }

    /// Run-level counters.
    #[must_use]
    pub fn statistics(&self) -> &DecisionStatistics {
        &self.statistics
    }

    /// Exports the log to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let export = DecisionExport {
            summary: self.statistics.clone(),
            reports: self.reports.clone(),
        };
        serde_json::to_string_pretty(&export)
    }

    /// Returns a console-friendly summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let stats = &self.statistics;
        format!(
            "Early-Stop Summary:\n\
             ├─ Checks Evaluated: {}\n\
             ├─ Checks Skipped: {}\n\
             ├─ Singular Checks: {}\n\
             ├─ Last Comparison: {}\n\
             └─ Stopped At: {}",
            stats.checks_evaluated,
            stats.checks_skipped,
            stats.singular_checks,
            stats
                .last_comparison
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}")),
            stats
                .stopped_at
                .map_or_else(|| "not stopped".to_string(), |s| format!("sample {s}")),
        )
    }

    /// Clears all collected reports and counters.
    pub fn reset(&mut self) {
        self.reports.clear();
        self.statistics = DecisionStatistics::default();
    }
}

/// Export structure for log serialization.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionExport {
    /// Run-level counters.
    pub summary: DecisionStatistics,

    /// Evaluated reports.
    pub reports: Vec<DecisionReport>,
}
