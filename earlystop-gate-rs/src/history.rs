//! Bounded training-loss history.
//!
//! [`LossHistory`] behaves like an append-only sequence of every training loss
//! seen in a run, but only stores what the decision formula reads: the last k
//! samples and the minimum over all samples. Memory stays at O(k) no matter how
//! long training runs, while `len()` still reports the total number of appends.
//!
//! # Example
//!
//! ```rust
//! use earlystop_gate_rs::history::LossHistory;
//!
//! let mut history = LossHistory::new(2);
//! history.append(3.0);
//! history.append(5.0);
//! history.append(4.0);
//!
//! assert_eq!(history.len(), 3);
//! assert_eq!(history.window(), vec![5.0, 4.0]);
//! assert_eq!(history.minimum(), Some(3.0));
//! ```

use crate::error::{EarlyStopError, EarlyStopResult};

/// Ring buffer of the last k losses plus a running global minimum.
#[derive(Debug, Clone)]
pub struct LossHistory {
    buffer: Vec<f32>,
    capacity: usize,
    head: usize,
    total: u64,
    minimum: Option<f32>,
}

impl LossHistory {
    /// Creates an empty history retaining the last `capacity` samples.
    ///
    /// A capacity of zero is raised to one. Storage grows with the samples
    /// appended, up to `capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::new(),
            capacity,
            head: 0,
            total: 0,
            minimum: None,
        }
    }

    /// Rebuilds a history from its persisted parts.
    ///
    /// `window` is in chronological order (oldest first) and holds at most
    /// `capacity` samples.
    ///
    /// # Errors
    ///
    /// Returns [`EarlyStopError::CheckpointError`] if the parts are
    /// inconsistent.
    pub fn from_parts(
        capacity: usize,
        window: Vec<f32>,
        total: u64,
        minimum: Option<f32>,
    ) -> EarlyStopResult<Self> {
        if capacity == 0 || window.len() > capacity {
            return Err(EarlyStopError::CheckpointError {
                reason: format!(
                    "history window of {} samples does not fit capacity {capacity}",
                    window.len()
                ),
            });
        }
        let expected_len = total.min(capacity as u64);
        if window.len() as u64 != expected_len || (total > 0) != minimum.is_some() {
            return Err(EarlyStopError::CheckpointError {
                reason: format!(
                    "history counters inconsistent: window {}, total {total}, minimum {minimum:?}",
                    window.len()
                ),
            });
        }

        let head = window.len() % capacity;
        Ok(Self {
            buffer: window,
            capacity,
            head,
            total,
            minimum,
        })
    }

    /// Appends a sample. Any value, including NaN and infinities, is stored.
    pub fn append(&mut self, sample: f32) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(sample);
        } else {
            self.buffer[self.head] = sample;
        }
        self.head = (self.head + 1) % self.capacity;
        self.total += 1;

        // f32::min skips NaN
        self.minimum = Some(match self.minimum {
            Some(current) => current.min(sample),
            None => sample,
        });
    }

    /// Total number of samples appended over the run.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.total
    }

    /// Returns whether no sample has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of most-recent samples retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Minimum over every sample ever appended.
    #[must_use]
    pub fn minimum(&self) -> Option<f32> {
        self.minimum
    }

    /// Most recently appended sample.
    #[must_use]
    pub fn last(&self) -> Option<f32> {
        if self.buffer.is_empty() {
            None
        } else {
            let idx = if self.head == 0 {
                self.buffer.len() - 1
            } else {
                self.head - 1
            };
            Some(self.buffer[idx])
        }
    }

    /// Returns whether a full window of `capacity` samples is available.
    #[must_use]
    pub fn is_window_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Retained samples in chronological order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let len = self.buffer.len();
        let start = if len < self.capacity { 0 } else { self.head };
        (0..len).map(move |i| self.buffer[(start + i) % self.capacity])
    }

    /// Retained samples collected in chronological order.
    #[must_use]
    pub fn window(&self) -> Vec<f32> {
        self.iter().collect()
    }
}
