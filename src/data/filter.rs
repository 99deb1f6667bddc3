use crate::error::{AnalysisError, AnalysisResult};

use super::model::{EnergySeries, XyFilter};

// ---------------------------------------------------------------------------
// Row alignment between the two bands
// ---------------------------------------------------------------------------

/// Both bands come from the same exposures, so they must have the same length
/// and identical positions row by row. Anything else is an upstream bug.
pub fn check_alignment(high: &EnergySeries, low: &EnergySeries) -> AnalysisResult<()> {
    if high.len() != low.len() {
        return Err(AnalysisError::RowAlignment(format!(
            "high has {} rows but low has {}",
            high.len(),
            low.len()
        )));
    }
    if let Some(row) = high.x.iter().zip(&low.x).position(|(h, l)| h != l) {
        return Err(AnalysisError::RowAlignment(format!(
            "row {row}: high x = {} but low x = {}",
            high.x[row], low.x[row]
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Joint x/value filter
// ---------------------------------------------------------------------------

/// Keep the rows where both bands have `val` inside `[y_low, y_high]` and
/// `x` inside `[x_low, x_high]`.
///
/// The position test is applied to each band separately even though the
/// positions are shared; [`check_alignment`] runs first so a divergence is
/// reported rather than filtered away. An empty result is valid.
pub fn filter_high_low(
    high: &EnergySeries,
    low: &EnergySeries,
    bounds: &XyFilter,
) -> AnalysisResult<(EnergySeries, EnergySeries)> {
    check_alignment(high, low)?;

    log::info!(
        "Filtering points, x in ({}, {}), y in ({}, {})",
        bounds.x_low,
        bounds.x_high,
        bounds.y_low,
        bounds.y_high
    );

    let x_range = bounds.x_range();
    let mask: Vec<bool> = (0..high.len())
        .map(|i| {
            bounds.y_contains(high.val[i])
                && bounds.y_contains(low.val[i])
                && x_range.contains(high.x[i])
                && x_range.contains(low.x[i])
        })
        .collect();

    let kept = mask.iter().filter(|&&keep| keep).count();
    log::debug!("{kept} of {} rows pass the xy filter", mask.len());

    Ok((high.select(&mask), low.select(&mask)))
}
