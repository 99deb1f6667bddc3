use thiserror::Error;

use crate::data::model::Band;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Failures surfaced by the analysis core. Nothing here is retried internally;
/// the caller decides whether to abort or continue with partial results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The table does not follow the `D1..D(128n)` channel convention.
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// A position range selected no rows.
    #[error("no rows in {what} region [{left}, {right}]")]
    EmptyRegion {
        what: &'static str,
        left: f64,
        right: f64,
    },

    /// Log-transmission of a non-positive signal or against a non-positive reference.
    #[error("attenuation undefined for signal {value} against reference {reference}")]
    Domain { value: f64, reference: f64 },

    #[error("power-law fit did not converge: {0}")]
    FitConvergence(String),

    /// Every channel of a band was missing for one exposure.
    #[error("{band} band has no channel values in row {row}")]
    InsufficientData { band: Band, row: usize },

    #[error("high/low series are not row-aligned: {0}")]
    RowAlignment(String),

    #[error("{band} series has no attenuation values")]
    MissingAttenuation { band: Band },

    #[error("invalid configuration: {0}")]
    Config(String),
}
