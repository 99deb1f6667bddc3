//! Negative-log transmission.

use crate::data::model::{EnergySeries, PositionRange};
use crate::error::{AnalysisError, AnalysisResult};
use crate::reference::mean_in_region;

/// `-ln(value / reference)`.
///
/// Both must be strictly positive and finite; a zero or negative detector
/// reading means corrupted or saturated data and is reported, never turned
/// into NaN or infinity.
pub fn attenuation(value: f64, reference: f64) -> AnalysisResult<f64> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(value) || !valid(reference) {
        return Err(AnalysisError::Domain { value, reference });
    }
    Ok(-(value / reference).ln())
}

/// Attenuation of every row, returned as a copy carrying the `att` column.
pub fn attenuate(series: &EnergySeries, reference: f64) -> AnalysisResult<EnergySeries> {
    let att = series
        .val
        .iter()
        .map(|&v| attenuation(v, reference))
        .collect::<AnalysisResult<Vec<_>>>()?;
    Ok(series.clone().with_attenuation(att))
}

/// Attenuation of the average signal inside `range`.
pub fn region_attenuation(
    series: &EnergySeries,
    reference: f64,
    range: &PositionRange,
) -> AnalysisResult<f64> {
    let avg = mean_in_region(series, range, "object")?;
    attenuation(avg, reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_point_attenuation_matches_log_transmission() {
        let low = EnergySeries::new(vec![0.0, 1.6, 3.2], vec![10.0, 8.0, 12.0]);
        let att = attenuate(&low, 20.0).unwrap().att.unwrap();
        let expected = [0.693_147, 0.916_291, 0.510_826];
        for (a, e) in att.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{a} vs {e}");
        }
    }

    #[test]
    fn transmission_round_trips() {
        for &(v, r) in &[(1.0, 1.0), (0.25, 40000.0), (12345.6, 41000.0), (5e4, 3.0)] {
            let a = attenuation(v, r).unwrap();
            let back = (-a).exp() * r;
            assert!((back - v).abs() <= 1e-9 * v, "{v} -> {back}");
        }
    }

    #[test]
    fn non_positive_values_are_domain_errors() {
        assert!(matches!(
            attenuation(0.0, 10.0),
            Err(AnalysisError::Domain { .. })
        ));
        assert!(matches!(
            attenuation(-3.0, 10.0),
            Err(AnalysisError::Domain { .. })
        ));
        assert!(matches!(
            attenuation(3.0, 0.0),
            Err(AnalysisError::Domain { .. })
        ));
        assert!(matches!(
            attenuation(f64::NAN, 10.0),
            Err(AnalysisError::Domain { .. })
        ));

        let s = EnergySeries::new(vec![0.0, 1.6], vec![5.0, 0.0]);
        assert!(attenuate(&s, 10.0).is_err());
    }

    #[test]
    fn region_attenuation_uses_the_region_average() {
        let s = EnergySeries::new(vec![0.0, 1.6, 3.2, 4.8], vec![40.0, 10.0, 30.0, 40.0]);
        let a = region_attenuation(&s, 40.0, &PositionRange::new(1.0, 4.0)).unwrap();
        assert!((a - 2.0f64.ln()).abs() < 1e-12);

        assert!(matches!(
            region_attenuation(&s, 40.0, &PositionRange::new(100.0, 200.0)),
            Err(AnalysisError::EmptyRegion { what: "object", .. })
        ));
    }
}
