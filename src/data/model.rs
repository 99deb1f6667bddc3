use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Band – which detector channel group a series came from
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    High,
    Low,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::High => write!(f, "high"),
            Band::Low => write!(f, "low"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelTable – the raw wide export, one row per exposure
// ---------------------------------------------------------------------------

/// A rectangular table of detector readings as exported by the rig.
///
/// Columns follow the `D1..D(128n)` naming convention but any extra columns
/// (row indices, timestamps) are kept and simply never looked up.
/// `None` marks an empty or null cell.
#[derive(Debug, Clone, Default)]
pub struct ChannelTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
    index: HashMap<String, usize>,
}

impl ChannelTable {
    /// Build a table, indexing column names. Rows shorter than the header are
    /// padded with missing cells.
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<Option<f64>>>) -> Self {
        let width = columns.len();
        for row in &mut rows {
            row.resize(width, None);
        }
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        ChannelTable {
            columns,
            rows,
            index,
        }
    }

    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Number of exposures (rows).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EnergySeries – averaged signal per scan position for one band
// ---------------------------------------------------------------------------

/// Parallel `x` / `val` / `att` sequences for one energy band.
///
/// `x` is strictly increasing. `att` is only present once the attenuation
/// transform has been applied and always has the same length as `x`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergySeries {
    pub x: Vec<f64>,
    pub val: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub att: Option<Vec<f64>>,
}

impl EnergySeries {
    pub fn new(x: Vec<f64>, val: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), val.len());
        EnergySeries { x, val, att: None }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Attach an attenuation column.
    pub fn with_attenuation(mut self, att: Vec<f64>) -> Self {
        debug_assert_eq!(att.len(), self.x.len());
        self.att = Some(att);
        self
    }

    /// `val` of every row whose position lies in `range`.
    pub fn values_in<'a>(&'a self, range: &'a PositionRange) -> impl Iterator<Item = f64> + 'a {
        self.x
            .iter()
            .zip(self.val.iter())
            .filter(move |&(&x, _)| range.contains(x))
            .map(|(_, &v)| v)
    }

    /// Keep the rows where `mask` is true, in order. `att` stays aligned.
    pub fn select(&self, mask: &[bool]) -> EnergySeries {
        fn pick(values: &[f64], mask: &[bool]) -> Vec<f64> {
            values
                .iter()
                .zip(mask)
                .filter(|&(_, &keep)| keep)
                .map(|(&v, _)| v)
                .collect()
        }
        EnergySeries {
            x: pick(&self.x, mask),
            val: pick(&self.val, mask),
            att: self.att.as_deref().map(|att| pick(att, mask)),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranges, regions and bounds supplied by the caller
// ---------------------------------------------------------------------------

/// An inclusive position interval `[left, right]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRange {
    pub left: f64,
    pub right: f64,
}

impl PositionRange {
    pub const fn new(left: f64, right: f64) -> Self {
        PositionRange { left, right }
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.left && x <= self.right
    }

    pub fn is_valid(&self) -> bool {
        self.left <= self.right
    }
}

/// A labelled position interval. Used both for object summaries and for
/// grouping point-cloud subsets; `colour` is passed through to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub left: f64,
    pub right: f64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
}

impl RegionOfInterest {
    pub fn new(left: f64, right: f64, label: impl Into<String>) -> Self {
        RegionOfInterest {
            left,
            right,
            label: label.into(),
            colour: None,
        }
    }

    pub fn with_colour(mut self, colour: impl Into<String>) -> Self {
        self.colour = Some(colour.into());
        self
    }

    pub fn range(&self) -> PositionRange {
        PositionRange::new(self.left, self.right)
    }
}

fn neg_inf() -> f64 {
    f64::NEG_INFINITY
}

fn pos_inf() -> f64 {
    f64::INFINITY
}

fn is_open(bound: &f64) -> bool {
    bound.is_infinite()
}

/// Position and value bounds applied jointly to a high/low pair.
/// Omitted bounds are open. Open (infinite) bounds are left out when
/// serialized, since JSON has no infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XyFilter {
    #[serde(default = "neg_inf", skip_serializing_if = "is_open")]
    pub x_low: f64,
    #[serde(default = "pos_inf", skip_serializing_if = "is_open")]
    pub x_high: f64,
    #[serde(default = "neg_inf", skip_serializing_if = "is_open")]
    pub y_low: f64,
    #[serde(default = "pos_inf", skip_serializing_if = "is_open")]
    pub y_high: f64,
}

impl Default for XyFilter {
    fn default() -> Self {
        XyFilter {
            x_low: f64::NEG_INFINITY,
            x_high: f64::INFINITY,
            y_low: f64::NEG_INFINITY,
            y_high: f64::INFINITY,
        }
    }
}

impl XyFilter {
    pub fn x_range(&self) -> PositionRange {
        PositionRange::new(self.x_low, self.x_high)
    }

    pub fn y_contains(&self, v: f64) -> bool {
        v >= self.y_low && v <= self.y_high
    }
}
