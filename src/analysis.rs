//! Analysis runs: object summaries, the dual-energy point cloud and its locus.
//!
//! ```text
//!  ChannelTable ─ split ─▶ (high, low) ─ spikes? ─▶ references
//!                                   │
//!                 objects ◀─────────┤
//!                                   ▼
//!                        xy filter? ─▶ attenuate ─▶ groups ─▶ locus?
//! ```

use serde::{Serialize, Serializer};

use crate::attenuation::{attenuate, region_attenuation};
use crate::color::{generate_palette, rainbow, to_hex};
use crate::config::AnalysisConfig;
use crate::data::filter::{check_alignment, filter_high_low};
use crate::data::model::{ChannelTable, EnergySeries, PositionRange, RegionOfInterest};
use crate::error::{AnalysisError, AnalysisResult};
use crate::locus::{fit_locus, LocusFit};
use crate::reference::reference_level;
use crate::spikes::interpolate_spikes;
use crate::split::split_high_low;

// ---------------------------------------------------------------------------
// Result types handed to the rendering layer
// ---------------------------------------------------------------------------

/// Unattenuated signal level per band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct References {
    pub high: f64,
    pub low: f64,
}

/// One object reduced to a single point of the high/low attenuation plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectAttenuation {
    pub label: String,
    pub left: f64,
    pub right: f64,
    pub low_att: f64,
    pub high_att: f64,
}

/// Indices into the point cloud that share a label and colour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointGroup {
    pub label: String,
    pub colour: String,
    pub indices: Vec<usize>,
}

/// Filtered, attenuated high/low series plus how to colour them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointCloud {
    pub high: EnergySeries,
    pub low: EnergySeries,
    pub groups: Vec<PointGroup>,
    /// Per-point colours when the cloud is coloured by scan order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_colours: Option<Vec<[u8; 3]>>,
}

impl PointCloud {
    /// `(low attenuation, high attenuation)` pairs in scan order.
    pub fn points(&self) -> Vec<[f64; 2]> {
        match (&self.low.att, &self.high.att) {
            (Some(l), Some(h)) => l.iter().zip(h).map(|(&x, &y)| [x, y]).collect(),
            _ => Vec::new(),
        }
    }

    /// Largest low-band attenuation, the natural right edge for a locus curve.
    pub fn low_att_max(&self) -> Option<f64> {
        self.low
            .att
            .as_ref()?
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_empty()
    }
}

fn serialize_locus<S: Serializer>(
    locus: &Option<Result<LocusFit, AnalysisError>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    #[serde(untagged)]
    enum Repr<'a> {
        Fit(&'a LocusFit),
        Failed { error: String },
    }
    locus
        .as_ref()
        .map(|r| match r {
            Ok(fit) => Repr::Fit(fit),
            Err(e) => Repr::Failed {
                error: e.to_string(),
            },
        })
        .serialize(serializer)
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Averaged (and spike-corrected, if requested) series before filtering.
    pub high: EnergySeries,
    pub low: EnergySeries,
    pub references: References,
    pub objects: Vec<ObjectAttenuation>,
    pub cloud: PointCloud,
    /// `None` when no fit range was requested; a failed fit is kept as its error.
    #[serde(serialize_with = "serialize_locus")]
    pub locus: Option<Result<LocusFit, AnalysisError>>,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Reference level of both bands over the same unattenuated region.
pub fn references(
    high: &EnergySeries,
    low: &EnergySeries,
    range: &PositionRange,
) -> AnalysisResult<References> {
    log::info!("Getting unattenuated reference values");
    let refs = References {
        high: reference_level(high, range)?,
        low: reference_level(low, range)?,
    };
    log::debug!("reference high = {}, low = {}", refs.high, refs.low);
    Ok(refs)
}

/// Attenuation of each object's region average in both bands.
pub fn object_attenuations(
    high: &EnergySeries,
    low: &EnergySeries,
    refs: &References,
    objects: &[RegionOfInterest],
) -> AnalysisResult<Vec<ObjectAttenuation>> {
    log::info!("Aggregating {} regions of interest", objects.len());
    objects
        .iter()
        .map(|obj| {
            let range = obj.range();
            Ok(ObjectAttenuation {
                label: obj.label.clone(),
                left: obj.left,
                right: obj.right,
                low_att: region_attenuation(low, refs.low, &range)?,
                high_att: region_attenuation(high, refs.high, &range)?,
            })
        })
        .collect()
}

/// Filter, attenuate and group the per-row point cloud.
///
/// References come from the unfiltered series so the filter cannot remove
/// the air gap they are measured on.
pub fn point_cloud(
    high: &EnergySeries,
    low: &EnergySeries,
    refs: &References,
    config: &AnalysisConfig,
) -> AnalysisResult<PointCloud> {
    check_alignment(high, low)?;
    let (high, low) = match &config.xy_filter {
        Some(bounds) => filter_high_low(high, low, bounds)?,
        None => (high.clone(), low.clone()),
    };

    log::info!("Taking negative log of transmission");
    let high = attenuate(&high, refs.high)?;
    let low = attenuate(&low, refs.low)?;

    let mut point_colours = None;
    let groups: Vec<PointGroup> = if !config.regions_of_interest.is_empty() {
        log::info!(
            "Grouping points within {} regions of interest",
            config.regions_of_interest.len()
        );
        let fallback = generate_palette(config.regions_of_interest.len());
        config
            .regions_of_interest
            .iter()
            .zip(fallback)
            .map(|(region, colour)| {
                let range = region.range();
                PointGroup {
                    label: region.label.clone(),
                    colour: region.colour.clone().unwrap_or_else(|| to_hex(colour)),
                    indices: (0..low.len())
                        .filter(|&i| range.contains(low.x[i]) && range.contains(high.x[i]))
                        .collect(),
                }
            })
            .collect()
    } else {
        if config.continuously_colour {
            log::info!("Colouring point cloud by scan order (violet -> red)");
            point_colours = Some(rainbow(low.len()));
        }
        vec![PointGroup {
            label: "all points".into(),
            colour: "b".into(),
            indices: (0..low.len()).collect(),
        }]
    };

    Ok(PointCloud {
        high,
        low,
        groups,
        point_colours,
    })
}

/// Run every stage the config asks for on a loaded table.
///
/// Errors in splitting, references, objects or the point cloud abort the
/// run. A locus fit failure does not: it is recorded in the report so the
/// cloud can still be rendered without a misleading curve.
pub fn analyze(table: &ChannelTable, config: &AnalysisConfig) -> AnalysisResult<AnalysisReport> {
    config.validate()?;

    let (mut high, mut low) = split_high_low(table, config.board_count, config.pixel_pitch)?;
    if config.interpolate_spikes.high {
        high = interpolate_spikes(&high).0;
    }
    if config.interpolate_spikes.low {
        low = interpolate_spikes(&low).0;
    }

    let refs = references(&high, &low, &config.reference)?;
    let objects = object_attenuations(&high, &low, &refs, &config.objects)?;
    let cloud = point_cloud(&high, &low, &refs, config)?;

    let locus = config.fit_range.map(|range| {
        let fit = fit_locus(&cloud.high, &cloud.low, &range, &config.fit);
        if let Err(e) = &fit {
            log::warn!("Locus omitted: {e}");
        }
        fit
    });

    Ok(AnalysisReport {
        high,
        low,
        references: refs,
        objects,
        cloud,
        locus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::XyFilter;

    fn pair(high: &[f64], low: &[f64]) -> (EnergySeries, EnergySeries) {
        let x: Vec<f64> = (0..high.len()).map(|i| i as f64 * 2.0).collect();
        (
            EnergySeries::new(x.clone(), high.to_vec()),
            EnergySeries::new(x, low.to_vec()),
        )
    }

    #[test]
    fn objects_use_region_averages() {
        let (high, low) = pair(&[50.0, 25.0, 25.0, 100.0], &[10.0, 8.0, 12.0, 20.0]);
        let refs = references(&high, &low, &PositionRange::new(6.0, 6.0)).unwrap();
        assert_eq!(refs, References { high: 100.0, low: 20.0 });

        let objs = object_attenuations(
            &high,
            &low,
            &refs,
            &[RegionOfInterest::new(2.0, 4.0, "kimb1")],
        )
        .unwrap();
        assert_eq!(objs[0].label, "kimb1");
        assert!((objs[0].low_att - 2.0f64.ln()).abs() < 1e-12);
        assert!((objs[0].high_att - 4.0f64.ln()).abs() < 1e-12);

        let err = object_attenuations(
            &high,
            &low,
            &refs,
            &[RegionOfInterest::new(100.0, 120.0, "missing")],
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyRegion { .. }));
    }

    #[test]
    fn cloud_is_filtered_before_attenuation() {
        // row 1 reads zero and would be a domain error if it survived the filter
        let (high, low) = pair(&[80.0, 0.0, 60.0, 100.0], &[16.0, 0.0, 10.0, 20.0]);
        let refs = References { high: 100.0, low: 20.0 };
        let mut cfg = AnalysisConfig::new(1, PositionRange::new(6.0, 6.0));
        cfg.xy_filter = Some(XyFilter {
            y_low: 1.0,
            ..XyFilter::default()
        });
        cfg.continuously_colour = true;

        let cloud = point_cloud(&high, &low, &refs, &cfg).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.point_colours.as_ref().map(Vec::len), Some(3));
        let pts = cloud.points();
        assert!((pts[0][0] - (20.0f64 / 16.0).ln()).abs() < 1e-12);
        assert!((pts[0][1] - (100.0f64 / 80.0).ln()).abs() < 1e-12);
        assert_eq!(pts[2], [0.0, 0.0]);

        cfg.xy_filter = None;
        assert!(matches!(
            point_cloud(&high, &low, &refs, &cfg),
            Err(AnalysisError::Domain { .. })
        ));
    }

    #[test]
    fn regions_group_points_by_position() {
        let (high, low) = pair(&[90.0, 80.0, 70.0, 60.0], &[18.0, 16.0, 14.0, 12.0]);
        let refs = References { high: 100.0, low: 20.0 };
        let mut cfg = AnalysisConfig::new(1, PositionRange::new(0.0, 0.0));
        cfg.regions_of_interest = vec![
            RegionOfInterest::new(0.0, 2.0, "22mm kimberlite").with_colour("tab:purple"),
            RegionOfInterest::new(4.0, 6.0, "Diamond 5mm"),
        ];
        cfg.continuously_colour = true;

        let cloud = point_cloud(&high, &low, &refs, &cfg).unwrap();
        assert!(cloud.point_colours.is_none());
        assert_eq!(cloud.groups.len(), 2);
        assert_eq!(cloud.groups[0].indices, vec![0, 1]);
        assert_eq!(cloud.groups[0].colour, "tab:purple");
        assert_eq!(cloud.groups[1].indices, vec![2, 3]);
        assert!(cloud.groups[1].colour.starts_with('#'));
    }

    #[test]
    fn low_att_max_ignores_missing_attenuation() {
        let (high, low) = pair(&[1.0], &[1.0]);
        let cloud = PointCloud {
            high,
            low,
            groups: Vec::new(),
            point_colours: None,
        };
        assert_eq!(cloud.low_att_max(), None);
        assert!(cloud.points().is_empty());
    }
}
