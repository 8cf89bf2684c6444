use crate::data::model::{AnomalySeries, IndexSeries, ensure_contiguous};
use crate::error::{PipelineError, Result};

/// Trailing rolling mean over `window` consecutive days.
///
/// The value at position `i` is the mean of positions `i - window + 1 ..= i`.
/// The first `window - 1` positions have no full window and are `None`;
/// partial windows are never averaged. The input must be gap-free, otherwise
/// the window would silently span the gap.
pub fn rolling_mean(series: &AnomalySeries, window: usize) -> Result<IndexSeries> {
    if window == 0 {
        return Err(PipelineError::InvalidWindow(window));
    }
    ensure_contiguous(series.dates())?;

    // Every window is summed independently; no running total.
    let values = series.values();
    let warm_up = (window - 1).min(values.len());
    let mut out = vec![None; warm_up];
    out.extend(
        values
            .windows(window)
            .map(|w| Some(w.iter().sum::<f64>() / window as f64)),
    );

    IndexSeries::new(series.dates().to_vec(), out)
}
