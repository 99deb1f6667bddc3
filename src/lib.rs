//! Dual-energy X-ray transmission analysis.
//!
//! Turns per-channel detector exports into high/low energy attenuation
//! profiles, summarises objects, and fits the power-law locus that separates
//! material classes in the high/low attenuation plane. Rendering is left to
//! the caller; everything here returns plain numeric data.

pub mod analysis;
pub mod attenuation;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod locus;
pub mod reference;
pub mod spikes;
pub mod split;

pub use analysis::{analyze, AnalysisReport};
pub use config::AnalysisConfig;
pub use data::loader::load_table;
pub use data::model::{
    Band, ChannelTable, EnergySeries, PositionRange, RegionOfInterest, XyFilter,
};
pub use error::{AnalysisError, AnalysisResult};
pub use locus::{FitConfig, LocusFit};
