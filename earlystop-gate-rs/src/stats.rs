//! Window statistics over training-loss samples.
//!
//! Three pure functions feed the decision formula:
//!
//! - [`find_min`] - minimum over the whole history (global, not windowed)
//! - [`find_median`] - upper median of the last k samples
//! - [`sum_last_k`] - sum of the last k samples
//!
//! The minimum is global while the median and the sum are windowed.
//!
//! The decision machine does not call [`find_min`] on every check. It reads
//! the running minimum kept by [`crate::history::LossHistory`], which equals
//! `find_min` over every sample ever appended.

use crate::error::{EarlyStopError, EarlyStopResult};

/// Statistics computed at one decision check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Global minimum over all samples.
    pub minimum: f32,
    /// Upper median of the last k samples.
    pub median: f32,
    /// Sum of the last k samples.
    pub sum_last_k: f32,
}

/// Returns the minimum over the entire history.
///
/// NaN samples are skipped, matching `f32::min`. A history made only of NaN
/// returns NaN.
///
/// # Errors
///
/// Returns [`EarlyStopError::PreconditionViolation`] for an empty history.
pub fn find_min(history: &[f32]) -> EarlyStopResult<f32> {
    let (first, rest) = history
        .split_first()
        .ok_or(EarlyStopError::PreconditionViolation {
            operation: "find_min",
            required: 1,
            available: 0,
        })?;

    Ok(rest.iter().fold(*first, |acc, &x| acc.min(x)))
}

/// Returns `sorted(last k)[k / 2]`.
///
/// For even k this is the upper median: `[1, 2, 3, 4]` yields `3`, not `2.5`.
/// Sorting uses `f32::total_cmp`, so positive NaN sorts above every number.
///
/// # Errors
///
/// Returns [`EarlyStopError::PreconditionViolation`] if `k == 0` or the
/// history holds fewer than k samples.
pub fn find_median(history: &[f32], k: usize) -> EarlyStopResult<f32> {
    let window = last_k(history, k, "find_median")?;

    let mut sorted = window.to_vec();
    sorted.sort_by(f32::total_cmp);
    Ok(sorted[k / 2])
}

/// Returns the arithmetic sum of exactly the last k samples.
///
/// # Errors
///
/// Returns [`EarlyStopError::PreconditionViolation`] if `k == 0` or the
/// history holds fewer than k samples.
pub fn sum_last_k(history: &[f32], k: usize) -> EarlyStopResult<f32> {
    Ok(last_k(history, k, "sum_last_k")?.iter().sum())
}

/// Computes the windowed statistics for a window of exactly k samples and an
/// externally tracked global minimum.
///
/// # Errors
///
/// Returns [`EarlyStopError::PreconditionViolation`] for an empty window.
pub fn window_stats(window: &[f32], minimum: f32) -> EarlyStopResult<WindowStats> {
    let k = window.len();
    Ok(WindowStats {
        minimum,
        median: find_median(window, k)?,
        sum_last_k: sum_last_k(window, k)?,
    })
}

fn last_k<'a>(history: &'a [f32], k: usize, operation: &'static str) -> EarlyStopResult<&'a [f32]> {
    if k == 0 || history.len() < k {
        return Err(EarlyStopError::PreconditionViolation {
            operation,
            required: k.max(1),
            available: history.len(),
        });
    }
    Ok(&history[history.len() - k..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_min_is_global() {
        // The minimum sits outside the last-2 window
        let history = [1.0, 9.0, 8.0, 7.0];
        assert_eq!(find_min(&history).unwrap(), 1.0);
    }

    #[test]
    fn test_find_min_empty() {
        assert!(matches!(
            find_min(&[]),
            Err(EarlyStopError::PreconditionViolation { required: 1, .. })
        ));
    }

    #[test]
    fn test_find_min_skips_nan() {
        assert_eq!(find_min(&[f32::NAN, 3.0, 2.0]).unwrap(), 2.0);
        assert!(find_min(&[f32::NAN]).unwrap().is_nan());
    }

    #[test]
    fn test_median_even_window_is_upper() {
        assert_eq!(find_median(&[4.0, 1.0, 3.0, 2.0], 4).unwrap(), 3.0);
    }

    #[test]
    fn test_median_odd_window() {
        assert_eq!(find_median(&[100.0, 5.0, 1.0, 3.0], 3).unwrap(), 3.0);
    }

    #[test]
    fn test_median_uses_only_last_k() {
        let history = [0.0, 0.0, 0.0, 10.0, 8.0, 6.0, 4.0];
        assert_eq!(find_median(&history, 4).unwrap(), 8.0);
    }

    #[test]
    fn test_median_window_of_one() {
        assert_eq!(find_median(&[2.0, 7.0], 1).unwrap(), 7.0);
    }

    #[test]
    fn test_median_short_history() {
        let err = find_median(&[1.0, 2.0], 4).unwrap_err();
        assert!(matches!(
            err,
            EarlyStopError::PreconditionViolation {
                operation: "find_median",
                required: 4,
                available: 2,
            }
        ));
    }

    #[test]
    fn test_sum_last_k() {
        assert_eq!(sum_last_k(&[100.0, 10.0, 8.0, 6.0, 4.0], 4).unwrap(), 28.0);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(sum_last_k(&[1.0], 0).is_err());
        assert!(find_median(&[1.0], 0).is_err());
    }

    #[test]
    fn test_window_stats() {
        let stats = window_stats(&[10.0, 8.0, 6.0, 4.0], 4.0).unwrap();
        assert_eq!(
            stats,
            WindowStats {
                minimum: 4.0,
                median: 8.0,
                sum_last_k: 28.0,
            }
        );
    }
}
