use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::data::model::{PositionRange, RegionOfInterest, XyFilter};
use crate::error::{AnalysisError, AnalysisResult};
use crate::locus::FitConfig;
use crate::split::DEFAULT_PIXEL_PITCH;

fn default_pixel_pitch() -> f64 {
    DEFAULT_PIXEL_PITCH
}

/// Which bands get single-row dropout correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeBands {
    pub high: bool,
    pub low: bool,
}

/// Every parameter of one analysis run. Nothing is read from globals.
///
/// ```json
/// {
///   "board_count": 10,
///   "reference": { "left": 900, "right": 950 },
///   "interpolate_spikes": { "high": true },
///   "xy_filter": { "x_low": 10, "x_high": 821, "y_low": 3000, "y_high": 47000 },
///   "fit_range": { "left": 10, "right": 821 },
///   "continuously_colour": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub board_count: usize,
    /// Scan distance per exposure.
    #[serde(default = "default_pixel_pitch")]
    pub pixel_pitch: f64,
    /// Unattenuated region used for both band references.
    pub reference: PositionRange,
    /// Objects summarised as a single (low, high) attenuation pair each.
    #[serde(default)]
    pub objects: Vec<RegionOfInterest>,
    /// Point-cloud groups; takes precedence over `continuously_colour`.
    #[serde(default)]
    pub regions_of_interest: Vec<RegionOfInterest>,
    #[serde(default)]
    pub xy_filter: Option<XyFilter>,
    #[serde(default)]
    pub fit_range: Option<PositionRange>,
    #[serde(default)]
    pub continuously_colour: bool,
    #[serde(default)]
    pub interpolate_spikes: SpikeBands,
    #[serde(default)]
    pub fit: FitConfig,
}

impl AnalysisConfig {
    pub fn new(board_count: usize, reference: PositionRange) -> Self {
        AnalysisConfig {
            board_count,
            pixel_pitch: DEFAULT_PIXEL_PITCH,
            reference,
            objects: Vec::new(),
            regions_of_interest: Vec::new(),
            xy_filter: None,
            fit_range: None,
            continuously_colour: false,
            interpolate_spikes: SpikeBands::default(),
            fit: FitConfig::default(),
        }
    }

    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&text).context("parsing config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.board_count == 0 {
            return Err(AnalysisError::Config("board_count must be at least 1".into()));
        }
        if !(self.pixel_pitch.is_finite() && self.pixel_pitch > 0.0) {
            return Err(AnalysisError::Config(format!(
                "pixel_pitch must be positive, got {}",
                self.pixel_pitch
            )));
        }

        let check = |name: &str, range: PositionRange| {
            if range.is_valid() {
                Ok(())
            } else {
                Err(AnalysisError::Config(format!(
                    "{name} has left {} > right {}",
                    range.left, range.right
                )))
            }
        };

        check("reference", self.reference)?;
        if let Some(range) = self.fit_range {
            check("fit_range", range)?;
        }
        if let Some(filter) = self.xy_filter {
            check("xy_filter x bounds", filter.x_range())?;
            check(
                "xy_filter y bounds",
                PositionRange::new(filter.y_low, filter.y_high),
            )?;
        }
        for region in self.objects.iter().chain(&self.regions_of_interest) {
            check(&format!("region '{}'", region.label), region.range())?;
        }
        if self.fit.max_iterations == 0 {
            return Err(AnalysisError::Config("fit.max_iterations must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_takes_defaults() {
        let cfg: AnalysisConfig = serde_json::from_str(
            r#"{ "board_count": 9, "reference": { "left": 780, "right": 900 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.pixel_pitch, 1.6);
        assert_eq!(cfg.fit.initial_guess, [2.0, 1.5]);
        assert!(cfg.objects.is_empty());
        assert!(!cfg.interpolate_spikes.high);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_xy_filter_leaves_other_bounds_open() {
        let cfg: AnalysisConfig = serde_json::from_str(
            r#"{
                "board_count": 10,
                "reference": { "left": 900, "right": 950 },
                "xy_filter": { "x_low": 10, "x_high": 821 },
                "regions_of_interest": [
                    { "left": 671, "right": 690, "label": "Diamond 5mm", "colour": "tab:red" }
                ],
                "interpolate_spikes": { "high": true }
            }"#,
        )
        .unwrap();
        let filter = cfg.xy_filter.unwrap();
        assert_eq!(filter.y_low, f64::NEG_INFINITY);
        assert_eq!(filter.y_high, f64::INFINITY);
        assert_eq!(cfg.regions_of_interest[0].colour.as_deref(), Some("tab:red"));
        assert!(cfg.interpolate_spikes.high && !cfg.interpolate_spikes.low);
    }

    #[test]
    fn open_filter_bounds_survive_a_save_and_load() {
        let mut cfg = AnalysisConfig::new(10, PositionRange::new(900.0, 950.0));
        cfg.xy_filter = Some(XyFilter {
            x_low: 10.0,
            x_high: 821.0,
            ..XyFilter::default()
        });

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("y_low") && !json.contains("y_high"), "{json}");

        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.board_count, 10);
        assert_eq!(back.reference, cfg.reference);
        let filter = back.xy_filter.unwrap();
        assert_eq!(filter.x_range(), PositionRange::new(10.0, 821.0));
        assert_eq!(filter.y_low, f64::NEG_INFINITY);
        assert_eq!(filter.y_high, f64::INFINITY);
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let mut cfg = AnalysisConfig::new(10, PositionRange::new(950.0, 900.0));
        assert!(matches!(cfg.validate(), Err(AnalysisError::Config(_))));

        cfg.reference = PositionRange::new(900.0, 950.0);
        cfg.objects.push(RegionOfInterest::new(20.0, 10.0, "kimb1"));
        assert!(matches!(cfg.validate(), Err(AnalysisError::Config(_))));

        cfg.objects.clear();
        cfg.board_count = 0;
        assert!(matches!(cfg.validate(), Err(AnalysisError::Config(_))));
    }
}
