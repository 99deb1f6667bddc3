//! Single-row dropout correction.
//!
//! Detector channels occasionally read low for one exposure. A centred
//! three-row window projects what the row should have read:
//!
//! ```text
//! smoothed[i] = mean(val[i-1], val[i], val[i+1]) * 1.5 - val[i] * 0.5
//!             = (val[i-1] + val[i+1]) / 2
//! ```
//!
//! and a row more than 5% below that projection is replaced by it.

use crate::data::model::EnergySeries;

/// Rows below `SPIKE_THRESHOLD * smoothed` are replaced.
pub const SPIKE_THRESHOLD: f64 = 0.95;

/// Replace isolated low readings, returning the corrected series and the
/// number of rows changed.
///
/// The first and last rows have no centred window and are never modified.
/// Every projection is computed from the uncorrected values, so a correction
/// never feeds into its neighbour's test. An existing `att` column no longer
/// matches the corrected values, so it is dropped whenever a row changes.
pub fn interpolate_spikes(series: &EnergySeries) -> (EnergySeries, usize) {
    log::info!("Interpolating spikes");

    let val = &series.val;
    let mut corrected = val.clone();
    let mut replaced = 0usize;

    for (i, window) in val.windows(3).enumerate() {
        let row = i + 1;
        let mean = (window[0] + window[1] + window[2]) / 3.0;
        let smoothed = mean * 1.5 - window[1] * 0.5;
        if window[1] < smoothed * SPIKE_THRESHOLD {
            corrected[row] = smoothed;
            replaced += 1;
        }
    }

    log::debug!("Replaced {replaced} of {} rows", val.len());

    let out = EnergySeries {
        x: series.x.clone(),
        val: corrected,
        att: if replaced > 0 { None } else { series.att.clone() },
    };
    (out, replaced)
}
