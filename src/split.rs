//! Board splitter and row aggregator.
//!
//! Each detector board carries 64 high-energy and 64 low-energy channels. A
//! table from `n` boards therefore has channels `D1..D(64n)` for the high band
//! followed by `D(64n+1)..D(128n)` for the low band.

use crate::data::model::{Band, ChannelTable, EnergySeries};
use crate::error::{AnalysisError, AnalysisResult};

/// Channels per band on a single detector board.
pub const CHANNELS_PER_BOARD: usize = 64;

/// Distance between consecutive exposures in mm.
pub const DEFAULT_PIXEL_PITCH: f64 = 1.6;

/// Column indices of the high and low channel groups for `board_count` boards.
pub fn channel_columns(
    table: &ChannelTable,
    board_count: usize,
) -> AnalysisResult<(Vec<usize>, Vec<usize>)> {
    if board_count == 0 {
        return Err(AnalysisError::Schema("board count must be at least 1".into()));
    }
    let per_band = CHANNELS_PER_BOARD * board_count;

    let lookup = |channel: usize| {
        let name = format!("D{channel}");
        table.column_index(&name).ok_or_else(|| {
            AnalysisError::Schema(format!(
                "missing column {name} expected for {board_count} boards"
            ))
        })
    };

    let high = (1..=per_band).map(&lookup).collect::<AnalysisResult<Vec<_>>>()?;
    let low = (per_band + 1..=2 * per_band)
        .map(&lookup)
        .collect::<AnalysisResult<Vec<_>>>()?;

    if table.column_index(&format!("D{}", 2 * per_band + 1)).is_some() {
        log::warn!(
            "table has channels beyond D{} which are ignored for {board_count} boards",
            2 * per_band
        );
    }

    Ok((high, low))
}

/// Average one channel group per row into a series with `x = row * pitch`.
///
/// Missing cells are skipped; a row with no readings at all in the group is
/// an [`AnalysisError::InsufficientData`].
pub fn average_rows(
    table: &ChannelTable,
    columns: &[usize],
    band: Band,
    pixel_pitch: f64,
) -> AnalysisResult<EnergySeries> {
    let mut x = Vec::with_capacity(table.len());
    let mut val = Vec::with_capacity(table.len());

    for (row_idx, row) in table.rows.iter().enumerate() {
        let (sum, count) = columns
            .iter()
            .filter_map(|&c| row[c])
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            return Err(AnalysisError::InsufficientData { band, row: row_idx });
        }
        x.push(row_idx as f64 * pixel_pitch);
        val.push(sum / count as f64);
    }

    Ok(EnergySeries::new(x, val))
}

/// Split a wide table into `(high, low)` averaged series.
pub fn split_high_low(
    table: &ChannelTable,
    board_count: usize,
    pixel_pitch: f64,
) -> AnalysisResult<(EnergySeries, EnergySeries)> {
    log::info!("Splitting high and low energy");
    let (high_cols, low_cols) = channel_columns(table, board_count)?;

    log::info!("Averaging rows");
    let high = average_rows(table, &high_cols, Band::High, pixel_pitch)?;
    let low = average_rows(table, &low_cols, Band::Low, pixel_pitch)?;
    log::debug!("{} exposures per band", high.len());

    Ok((high, low))
}
