//! Trailing moving averages over a sample series.

use crate::sample::Sample;
use crate::SegError;

/// Trailing mean over `window` consecutive samples.
///
/// One output sample per position where the window is full, stamped with the
/// timestamp of the window's last member. Fewer than `window` samples yields
/// an empty result.
pub fn rolling_mean<T: Clone>(
    samples: &[Sample<T>],
    window: usize,
) -> Result<Vec<Sample<T>>, SegError> {
    if window == 0 {
        return Err(SegError::InvalidParameter(
            "rolling window must be at least one sample".into(),
        ));
    }
    if samples.len() < window {
        return Ok(Vec::new());
    }

    Ok(samples
        .windows(window)
        .map(|w| {
            let sum: f64 = w.iter().map(|s| s.value).sum();
            Sample::new(w[window - 1].timestamp.clone(), sum / window as f64)
        })
        .collect())
}
