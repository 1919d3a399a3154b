//! Checkpoint save/restore for the decision machine.
//!
//! A checkpoint captures everything the machine needs to resume a monitored
//! run after the host restarts:
//! - Configuration (threshold, lamina, window size, policies)
//! - The last k training losses, the running minimum and the sample count
//! - Decision state, including the latched stop flag
//!
//! The validation channel is not part of the checkpoint. Pair checkpoints with
//! a [`crate::channel::FileChannel`] when the last validation loss must also
//! survive a restart.
//!
//! # Format
//!
//! Checkpoints are pretty-printed JSON. Non-finite losses are stored as the
//! strings `"NaN"`, `"inf"` and `"-inf"`.
//!
//! # Usage
//!
//! ```rust,ignore
//! machine.checkpoint().save("earlystop_checkpoint.json")?;
//!
//! let checkpoint = MachineCheckpoint::load("earlystop_checkpoint.json")?;
//! let machine = DecisionMachine::restore(checkpoint, channel)?;
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::EarlyStopConfig;
use crate::error::{EarlyStopError, EarlyStopResult};
use crate::machine::DecisionState;

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Complete checkpoint of one decision machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineCheckpoint {
    /// Checkpoint format version for compatibility checking.
    pub version: u32,

    /// Machine configuration.
    pub config: EarlyStopConfig,

    /// Last `min(sample_count, k)` training losses, oldest first.
    #[serde(with = "crate::float_serde::vec")]
    pub window: Vec<f32>,

    /// Training samples appended over the run.
    pub sample_count: u64,

    /// Running minimum over all training losses.
    #[serde(with = "crate::float_serde::option")]
    pub minimum: Option<f32>,

    /// Decision state at capture time.
    pub state: DecisionState,

    /// Metadata about the checkpoint.
    pub metadata: CheckpointMetadata,
}

impl MachineCheckpoint {
    /// Creates a checkpoint from machine components.
    #[must_use]
    pub fn new(
        config: EarlyStopConfig,
        window: Vec<f32>,
        sample_count: u64,
        minimum: Option<f32>,
        state: DecisionState,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            config,
            window,
            sample_count,
            minimum,
            state,
            metadata: CheckpointMetadata::new().with_step(sample_count),
        }
    }

    /// Saves the checkpoint to a file.
    ///
    /// The checkpoint is written to a sibling `.tmp` file and renamed over
    /// `path`, so an existing checkpoint is only replaced by a complete one.
    ///
    /// # Errors
    ///
    /// Returns an error if file creation, serialization, flushing or the
    /// final rename fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EarlyStopResult<()> {
        let path = path.as_ref();
        let temp = temp_path(path);

        let result = File::create(&temp)
            .map_err(|e| EarlyStopError::CheckpointError {
                reason: format!("Failed to create checkpoint file: {e}"),
            })
            .and_then(|file| self.write_json(file))
            .and_then(|()| {
                std::fs::rename(&temp, path).map_err(|e| EarlyStopError::CheckpointError {
                    reason: format!("Failed to move checkpoint into place: {e}"),
                })
            });

        if result.is_err() {
            let _ = std::fs::remove_file(&temp);
        }
        result?;

        tracing::debug!(
            path = %path.display(),
            samples = self.sample_count,
            "checkpoint saved"
        );
        Ok(())
    }

    fn write_json(&self, file: File) -> EarlyStopResult<()> {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| {
            EarlyStopError::CheckpointError {
                reason: format!("Failed to serialize checkpoint: {e}"),
            }
        })?;
        writer.flush().map_err(|e| EarlyStopError::CheckpointError {
            reason: format!("Failed to flush checkpoint: {e}"),
        })
    }

    /// Loads a checkpoint from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, is corrupted, or has an
    /// incompatible version.
    pub fn load<P: AsRef<Path>>(path: P) -> EarlyStopResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| EarlyStopError::CheckpointError {
            reason: format!("Failed to open checkpoint file: {e}"),
        })?;

        let checkpoint: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            EarlyStopError::CheckpointError {
                reason: format!("Failed to deserialize checkpoint: {e}"),
            }
        })?;

        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(EarlyStopError::CheckpointError {
                reason: format!(
                    "Incompatible checkpoint version: {} (expected {})",
                    checkpoint.version, CHECKPOINT_VERSION
                ),
            });
        }

        Ok(checkpoint)
    }
}

/// Metadata about a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Training sample count when the checkpoint was created.
    pub step: u64,

    /// Wall-clock timestamp (RFC 3339 format).
    pub timestamp: String,

    /// User-provided notes.
    pub notes: String,
}

impl CheckpointMetadata {
    /// Creates new metadata with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            notes: String::new(),
        }
    }

    /// Sets the sample count.
    #[must_use]
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Sets user notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl Default for CheckpointMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic checkpointing with rotation.
pub struct CheckpointManager {
    /// Directory where checkpoints are saved.
    checkpoint_dir: PathBuf,

    /// Save a checkpoint every N training samples.
    save_interval: u64,

    /// Number of checkpoints to keep.
    keep_last_n: usize,

    /// Checkpoint files, oldest first.
    checkpoints: Vec<PathBuf>,
}

const FILE_PREFIX: &str = "earlystop_sample_";

impl CheckpointManager {
    /// Creates a manager over `checkpoint_dir`, picking up existing checkpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or scanned.
    pub fn new(
        checkpoint_dir: impl AsRef<Path>,
        save_interval: u64,
        keep_last_n: usize,
    ) -> EarlyStopResult<Self> {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&checkpoint_dir).map_err(|e| EarlyStopError::CheckpointError {
            reason: format!("Failed to create checkpoint directory: {e}"),
        })?;

        let checkpoints = Self::scan_checkpoints(&checkpoint_dir)?;

        Ok(Self {
            checkpoint_dir,
            save_interval,
            keep_last_n: keep_last_n.max(1),
            checkpoints,
        })
    }

    /// Checks if a checkpoint is due at the given sample count.
    #[must_use]
    pub fn should_save(&self, sample_count: u64) -> bool {
        self.save_interval > 0 && sample_count > 0 && sample_count % self.save_interval == 0
    }

    /// Saves a checkpoint and removes the oldest beyond `keep_last_n`.
    ///
    /// # Errors
    ///
    /// Returns an error if saving or rotation fails.
    pub fn save(&mut self, checkpoint: &MachineCheckpoint) -> EarlyStopResult<PathBuf> {
        let filename = format!("{FILE_PREFIX}{:010}.json", checkpoint.sample_count);
        let path = self.checkpoint_dir.join(filename);

        checkpoint.save(&path)?;

        self.checkpoints.retain(|p| p != &path);
        self.checkpoints.push(path.clone());
        self.rotate_checkpoints()?;

        Ok(path)
    }

    /// Loads the most recent checkpoint, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails.
    pub fn load_latest(&self) -> EarlyStopResult<Option<MachineCheckpoint>> {
        self.checkpoints
            .last()
            .map(MachineCheckpoint::load)
            .transpose()
    }

    /// Returns the path to the most recent checkpoint.
    #[must_use]
    pub fn latest_checkpoint_path(&self) -> Option<&Path> {
        self.checkpoints.last().map(PathBuf::as_path)
    }

    fn scan_checkpoints(dir: &Path) -> EarlyStopResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|e| EarlyStopError::CheckpointError {
            reason: format!("Failed to read checkpoint directory: {e}"),
        })?;

        let mut checkpoints = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EarlyStopError::CheckpointError {
                reason: format!("Failed to read directory entry: {e}"),
            })?;

            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json")
                && sample_of(&path).is_some()
            {
                checkpoints.push(path);
            }
        }

        checkpoints.sort_by_key(|path| sample_of(path).unwrap_or(0));
        Ok(checkpoints)
    }

    fn rotate_checkpoints(&mut self) -> EarlyStopResult<()> {
        while self.checkpoints.len() > self.keep_last_n {
            let oldest = self.checkpoints.remove(0);
            std::fs::remove_file(&oldest).map_err(|e| EarlyStopError::CheckpointError {
                reason: format!("Failed to delete old checkpoint: {e}"),
            })?;
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn sample_of(path: &Path) -> Option<u64> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix(FILE_PREFIX))
        .and_then(|s| s.parse().ok())
}
