/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → ChannelTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ ChannelTable  │  D1..D(128n) per exposure
///   └──────────────┘
///        │   split (crate::split)
///        ▼
///   ┌──────────────┐
///   │ EnergySeries  │  x, val, att per band
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  joint x/value bounds → row-aligned high/low pair
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
