use crate::data::model::{EnergySeries, PositionRange};
use crate::error::{AnalysisError, AnalysisResult};

/// Mean `val` over the rows whose position lies in `range`.
///
/// Errors with [`AnalysisError::EmptyRegion`] when no row falls inside. The
/// caller picks an unattenuated region (an air gap) so the result is positive;
/// that is checked where the value is used as a divisor.
pub fn mean_in_region(
    series: &EnergySeries,
    range: &PositionRange,
    what: &'static str,
) -> AnalysisResult<f64> {
    let (sum, count) = series
        .values_in(range)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return Err(AnalysisError::EmptyRegion {
            what,
            left: range.left,
            right: range.right,
        });
    }
    Ok(sum / count as f64)
}

/// Unattenuated reference level of one band.
pub fn reference_level(series: &EnergySeries, range: &PositionRange) -> AnalysisResult<f64> {
    mean_in_region(series, range, "reference")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_covers_inclusive_bounds() {
        let s = EnergySeries::new(vec![0.0, 1.0, 2.0, 3.0], vec![5.0, 10.0, 20.0, 99.0]);
        let r = reference_level(&s, &PositionRange::new(1.0, 2.0)).unwrap();
        assert_eq!(r, 15.0);
    }

    #[test]
    fn row_order_does_not_change_the_mean() {
        let x = vec![0.0, 1.6, 3.2, 4.8, 6.4];
        let val = vec![41000.0, 40500.0, 39800.0, 40100.0, 12.0];
        let forward = EnergySeries::new(x.clone(), val.clone());
        let reversed = EnergySeries::new(
            x.into_iter().rev().collect(),
            val.into_iter().rev().collect(),
        );
        let range = PositionRange::new(0.0, 5.0);
        let a = reference_level(&forward, &range).unwrap();
        let b = reference_level(&reversed, &range).unwrap();
        assert!((a - b).abs() <= 1e-9 * a.abs());
    }

    #[test]
    fn empty_region_is_an_error() {
        let s = EnergySeries::new(vec![0.0, 1.6], vec![1.0, 2.0]);
        let err = reference_level(&s, &PositionRange::new(10.0, 20.0)).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::EmptyRegion {
                what: "reference",
                left: 10.0,
                right: 20.0
            }
        );
    }
}
