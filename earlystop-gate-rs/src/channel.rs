//! Cross-phase channel carrying the latest validation loss to training.
//!
//! A validation pass writes its loss into the channel; a later training-phase
//! check reads it. The two invocations never share a call stack, so the slot
//! is an explicit object handed to both sides instead of ambient global state.
//!
//! # Implementations
//!
//! - [`SharedChannel`] - in-process slot behind a `parking_lot::Mutex`. Clones
//!   are handles to the same slot, so a validation handler and a training
//!   handler can each hold one.
//! - [`FileChannel`] - durable slot for hosts that may restart between a
//!   validation pass and the next training check. Each write atomically
//!   replaces a small JSON record on disk.
//!
//! Both follow last-write-wins semantics and report
//! [`EarlyStopError::ChannelEmpty`] until the first write.
//!
//! # Example
//!
//! ```rust
//! use earlystop_gate_rs::channel::{SharedChannel, ValidationChannel};
//!
//! let validation_side = SharedChannel::new();
//! let training_side = validation_side.clone();
//!
//! assert!(training_side.read().is_err());
//! validation_side.write(0.42).unwrap();
//! assert_eq!(training_side.read().unwrap(), 0.42);
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{EarlyStopError, EarlyStopResult};

/// Single-slot store bridging validation and training phases.
pub trait ValidationChannel: Send + Sync {
    /// Replaces the stored value unconditionally.
    fn write(&self, value: f32) -> EarlyStopResult<()>;

    /// Returns the most recently written value.
    ///
    /// # Errors
    ///
    /// Returns [`EarlyStopError::ChannelEmpty`] if nothing was ever written.
    fn read(&self) -> EarlyStopResult<f32>;
}

impl<C: ValidationChannel + ?Sized> ValidationChannel for Box<C> {
    fn write(&self, value: f32) -> EarlyStopResult<()> {
        (**self).write(value)
    }

    fn read(&self) -> EarlyStopResult<f32> {
        (**self).read()
    }
}

impl<C: ValidationChannel + ?Sized> ValidationChannel for Arc<C> {
    fn write(&self, value: f32) -> EarlyStopResult<()> {
        (**self).write(value)
    }

    fn read(&self) -> EarlyStopResult<f32> {
        (**self).read()
    }
}

/// In-process channel. Clones share one slot.
#[derive(Debug, Clone, Default)]
pub struct SharedChannel {
    slot: Arc<Mutex<Option<f32>>>,
}

impl SharedChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a value has been written.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl ValidationChannel for SharedChannel {
    fn write(&self, value: f32) -> EarlyStopResult<()> {
        *self.slot.lock() = Some(value);
        Ok(())
    }

    fn read(&self) -> EarlyStopResult<f32> {
        self.slot.lock().ok_or(EarlyStopError::ChannelEmpty)
    }
}

/// On-disk record written by [`FileChannel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// The validation loss.
    #[serde(with = "crate::float_serde")]
    pub value: f32,

    /// Write counter, starting at 1 for the first write to this location.
    pub sequence: u64,

    /// Wall-clock time of the write (RFC 3339).
    pub written_at: String,
}

/// Durable channel backed by a single JSON record.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// record, so a reader never observes a partially written value.
#[derive(Debug)]
pub struct FileChannel {
    path: PathBuf,
    sequence: Mutex<u64>,
}

impl FileChannel {
    /// Opens a channel at `path`, creating parent directories as needed.
    ///
    /// An existing record is kept and remains readable.
    ///
    /// # Errors
    ///
    /// Returns [`EarlyStopError::ChannelIo`] if the parent directory cannot be
    /// created or an existing record is unreadable.
    pub fn open(path: impl AsRef<Path>) -> EarlyStopResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(&path, "create directory", &e))?;
        }

        let sequence = Self::load_record(&path)?.map_or(0, |record| record.sequence);

        Ok(Self {
            path,
            sequence: Mutex::new(sequence),
        })
    }

    /// Location of the backing record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the full record, if one has been written.
    ///
    /// # Errors
    ///
    /// Returns [`EarlyStopError::ChannelIo`] if the record exists but cannot
    /// be read or parsed.
    pub fn record(&self) -> EarlyStopResult<Option<ValidationRecord>> {
        Self::load_record(&self.path)
    }

    fn load_record(path: &Path) -> EarlyStopResult<Option<ValidationRecord>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, "read", &e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| EarlyStopError::ChannelIo {
                path: path.display().to_string(),
                reason: format!("Failed to parse validation record: {e}"),
            })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ValidationChannel for FileChannel {
    fn write(&self, value: f32) -> EarlyStopResult<()> {
        let mut sequence = self.sequence.lock();
        let record = ValidationRecord {
            value,
            sequence: *sequence + 1,
            written_at: chrono::Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string(&record).map_err(|e| EarlyStopError::ChannelIo {
            path: self.path.display().to_string(),
            reason: format!("Failed to serialize validation record: {e}"),
        })?;

        let temp = self.temp_path();
        let persisted = fs::write(&temp, content)
            .map_err(|e| io_error(&temp, "write", &e))
            .and_then(|()| {
                fs::rename(&temp, &self.path).map_err(|e| io_error(&self.path, "replace", &e))
            });
        if persisted.is_err() {
            let _ = fs::remove_file(&temp);
        }
        persisted?;

        *sequence = record.sequence;
        tracing::trace!(
            path = %self.path.display(),
            value,
            sequence = record.sequence,
            "validation record persisted"
        );
        Ok(())
    }

    fn read(&self) -> EarlyStopResult<f32> {
        self.record()?
            .map(|record| record.value)
            .ok_or(EarlyStopError::ChannelEmpty)
    }
}

fn io_error(path: &Path, action: &str, err: &std::io::Error) -> EarlyStopError {
    EarlyStopError::ChannelIo {
        path: path.display().to_string(),
        reason: format!("Failed to {action}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shared_channel_empty() {
        let channel = SharedChannel::new();
        assert!(!channel.is_written());
        assert!(matches!(channel.read(), Err(EarlyStopError::ChannelEmpty)));
    }

    #[test]
    fn test_shared_channel_last_write_wins() {
        let channel = SharedChannel::new();
        channel.write(3.0).unwrap();
        channel.write(2.0).unwrap();
        assert_eq!(channel.read().unwrap(), 2.0);
    }

    #[test]
    fn test_shared_channel_clones_share_slot() {
        let writer = SharedChannel::new();
        let reader = writer.clone();
        writer.write(1.25).unwrap();
        assert!(reader.is_written());
        assert_eq!(reader.read().unwrap(), 1.25);
    }

    #[test]
    fn test_boxed_channel_delegates() {
        let channel: Box<dyn ValidationChannel> = Box::new(SharedChannel::new());
        channel.write(4.0).unwrap();
        assert_eq!(channel.read().unwrap(), 4.0);
    }

    #[test]
    fn test_file_channel_empty_until_written() {
        let temp_dir = TempDir::new().unwrap();
        let channel = FileChannel::open(temp_dir.path().join("val_loss.json")).unwrap();
        assert!(matches!(channel.read(), Err(EarlyStopError::ChannelEmpty)));
        assert!(channel.record().unwrap().is_none());
    }

    #[test]
    fn test_file_channel_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("slots").join("val_loss.json");

        {
            let channel = FileChannel::open(&path).unwrap();
            channel.write(0.75).unwrap();
            channel.write(0.5).unwrap();
        }

        let reopened = FileChannel::open(&path).unwrap();
        assert_eq!(reopened.read().unwrap(), 0.5);
        assert_eq!(reopened.record().unwrap().unwrap().sequence, 2);

        reopened.write(0.25).unwrap();
        assert_eq!(reopened.record().unwrap().unwrap().sequence, 3);
    }

    #[test]
    fn test_file_channel_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let channel = FileChannel::open(temp_dir.path().join("val_loss.json")).unwrap();
        channel.write(1.0).unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["val_loss.json".to_string()]);
    }

    #[test]
    fn test_failed_replace_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("val_loss.json");
        let channel = FileChannel::open(&path).unwrap();

        // A non-empty directory at the record path makes the rename fail
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(matches!(
            channel.write(1.0),
            Err(EarlyStopError::ChannelIo { .. })
        ));
        assert!(!temp_dir.path().join("val_loss.json.tmp").exists());
    }

    #[test]
    fn test_file_channel_stores_nan() {
        let temp_dir = TempDir::new().unwrap();
        let channel = FileChannel::open(temp_dir.path().join("val_loss.json")).unwrap();
        channel.write(f32::NAN).unwrap();
        assert!(channel.read().unwrap().is_nan());
    }

    #[test]
    fn test_file_channel_corrupt_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("val_loss.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileChannel::open(&path),
            Err(EarlyStopError::ChannelIo { .. })
        ));
    }
}
