use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::ChannelTable;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a detector export into a [`ChannelTable`].  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row of column names, one exposure per line (recommended)
/// * `.parquet` – one numeric column per channel
/// * `.json`    – `[{ "D1": 41230.0, "D2": 40987.0, ... }, ...]`
pub fn load_table(path: &Path) -> Result<ChannelTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    log::info!("Reading in data from {}", path.display());

    let table = match ext.as_str() {
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;

    log::debug!(
        "Loaded {} rows x {} columns",
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, every other line one exposure.
/// Empty cells and `nan` are missing readings. Unnamed leading columns (row
/// indices written by spreadsheet tools) are kept as ordinary columns.
fn load_csv(path: &Path) -> Result<ChannelTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = record
            .iter()
            .enumerate()
            .map(|(col_idx, cell)| {
                parse_cell(cell).with_context(|| {
                    let name = headers.get(col_idx).map(String::as_str).unwrap_or("?");
                    format!("Row {row_no}, column '{name}': '{cell}' is not a number")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(row);
    }

    Ok(ChannelTable::new(headers, rows))
}

fn parse_cell(s: &str) -> Result<Option<f64>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let v: f64 = s.parse()?;
    Ok(if v.is_nan() { None } else { Some(v) })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "D1": 41230.0, "D2": 40987.0, ... },
///   ...
/// ]
/// ```
///
/// Columns are the keys of the first record; `null` is a missing reading.
fn load_json(path: &Path) -> Result<ChannelTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    if let Some(first) = records.first() {
        let obj = first.as_object().context("Row 0 is not a JSON object")?;
        columns.extend(obj.keys().cloned());
    }

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let row = columns
            .iter()
            .map(|col| match obj.get(col) {
                None | Some(JsonValue::Null) => Ok(None),
                Some(v) => v
                    .as_f64()
                    .map(Some)
                    .with_context(|| format!("Row {i}, column '{col}': not a number")),
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(row);
    }

    Ok(ChannelTable::new(columns, rows))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one numeric column per channel.
///
/// Float64, Float32, Int32 and Int64 columns are accepted; nulls are missing
/// readings. The schema of the first record batch fixes the column order.
fn load_parquet(path: &Path) -> Result<ChannelTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let n_rows = batch.num_rows();

        let decoded = batch
            .columns()
            .iter()
            .zip(&columns)
            .map(|(col, name)| {
                extract_f64_column(col).with_context(|| format!("column '{name}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..n_rows {
            rows.push(decoded.iter().map(|col| col[row]).collect());
        }
    }

    Ok(ChannelTable::new(columns, rows))
}

// -- Parquet / Arrow helpers --

/// Decode a numeric Arrow column into optional `f64` readings.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<Option<f64>>> {
    let values: Vec<Option<f64>> = match col.data_type() {
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("expected Float64Array")?
            .iter()
            .collect(),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("expected Float32Array")?
            .iter()
            .map(|v| v.map(f64::from))
            .collect(),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .context("expected Int32Array")?
            .iter()
            .map(|v| v.map(f64::from))
            .collect(),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("expected Int64Array")?
            .iter()
            .map(|v| v.map(|i| i as f64))
            .collect(),
        other => bail!("Expected a numeric column, got {other:?}"),
    };
    Ok(values)
}
