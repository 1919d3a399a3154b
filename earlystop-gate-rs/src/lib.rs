//! # earlystop-gate-rs
//!
//! Early-stop decision engine for training loops that monitor one loss stream.
//!
//! ## Overview
//!
//! The engine watches the training loss, periodically compares the latest
//! validation loss against short-term training statistics, and latches a
//! `stop` flag once the validation loss drifts too far above the best
//! training loss seen. While the flag is clear the backward pass emits a unit
//! gate signal; once it is set the gate emits zero and upstream parameters
//! stop receiving updates.
//!
//! ```text
//! training loss ──▶ LossHistory ──(every k-th sample)──▶ WindowStats
//!                                                            │
//! validation loss ──▶ ValidationChannel ─────────────────────┤
//!                                                            ▼
//!                                               DecisionMachine (stop latch)
//!                                                            │
//!                                     backward pass ◀── GateSignal (1 / 0)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use earlystop_gate_rs::prelude::*;
//!
//! let config = EarlyStopConfig::new(0.1, 1.0, 4);
//! let mut machine = DecisionMachine::new(config, SharedChannel::new()).unwrap();
//!
//! machine.observe_validation(3.0).unwrap();
//! for loss in [1.0, 1.0, 1.0, 9.0] {
//!     machine.observe_training(loss);
//! }
//!
//! assert!(machine.is_stopped());
//! assert_eq!(machine.gate().value(), 0.0);
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Engine configuration and TOML serialization
//! - [`error`] - Error types with check policies
//! - [`stats`] - Minimum, upper median and windowed sum
//! - [`history`] - Bounded training-loss history with running minimum
//! - [`channel`] - In-process and durable validation-loss channels
//! - [`machine`] - Decision state machine
//! - [`gate`] - Backward-pass gate signal
//! - [`layer`] - Forward/backward adapter for layer-style hosts
//! - [`report`] - Per-check reports and run summaries
//! - [`checkpoint`] - Machine checkpoint save/restore

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
// Window sizes and sample counts are cast to f32 in the comparison formula
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::float_cmp)]

pub mod channel;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod layer;
pub mod machine;
pub mod report;
pub mod stats;

mod float_serde;

pub use channel::{FileChannel, SharedChannel, ValidationChannel, ValidationRecord};
pub use checkpoint::{CheckpointManager, CheckpointMetadata, MachineCheckpoint};
pub use config::{CheckTrigger, EarlyStopConfig, SingularityPolicy};
pub use error::{CheckPolicy, EarlyStopError, EarlyStopResult, SingularTerm};
pub use gate::GateSignal;
pub use history::LossHistory;
pub use layer::{EarlyStopLayer, ForwardOutput, Phase};
pub use machine::{DecisionMachine, DecisionState};
pub use report::{CheckOutcome, DecisionLog, DecisionReport, SkipReason};
pub use stats::WindowStats;

/// Commonly used types.
pub mod prelude {
    pub use crate::channel::{FileChannel, SharedChannel, ValidationChannel};
    pub use crate::checkpoint::{CheckpointManager, MachineCheckpoint};
    pub use crate::config::{CheckTrigger, EarlyStopConfig, SingularityPolicy};
    pub use crate::error::{EarlyStopError, EarlyStopResult};
    pub use crate::gate::GateSignal;
    pub use crate::layer::{EarlyStopLayer, Phase};
    pub use crate::machine::{DecisionMachine, DecisionState};
    pub use crate::report::{CheckOutcome, DecisionLog, SkipReason};
}
