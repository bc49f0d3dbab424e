use bit_set::BitSet;
use ndarray::{Array1, ArrayView1};

use super::error::DataError;
use super::spline::CubicSpline;
use super::time_series::TimeSeries;

/// The outcome of iterative outlier removal
#[derive(Debug, Clone)]
pub struct OutlierRemoval {
    /// The corrected series; same length and sample times as the input
    pub series: TimeSeries,
    /// False when the loop stopped because an outlier set repeated
    pub converged: bool,
    pub iterations: usize,
    /// Every index that was replaced at least once
    pub replaced: BitSet,
}

/// Indices where |x - mean| > sigma * std (population std)
pub fn find_outliers(values: ArrayView1<f64>, sigma: f64) -> BitSet {
    let mut outliers = BitSet::with_capacity(values.len());
    if values.is_empty() {
        return outliers;
    }
    let mean = values.mean().unwrap_or(0.0);
    let std = values.std(0.0);
    let limit = sigma * std;
    for (idx, value) in values.iter().enumerate() {
        if (value - mean).abs() > limit {
            outliers.insert(idx);
        }
    }
    outliers
}

/// Iteratively replace outliers in a series with spline-interpolated values.
///
/// Each pass finds the outliers of the current series, fits an interpolating cubic
/// spline through the remaining samples (indexed by sample time), and substitutes the
/// spline at the outlier times. The loop ends when no outliers remain, or when the
/// outlier set equals one already seen, in which case the result is flagged as not
/// converged.
pub fn remove_outliers(series: &TimeSeries, sigma: f64) -> Result<OutlierRemoval, DataError> {
    let mut values: Array1<f64> = series.values.clone();
    let mut seen: Vec<BitSet> = Vec::new();
    let mut replaced = BitSet::with_capacity(series.len());
    let mut iterations = 0;

    loop {
        let outliers = find_outliers(values.view(), sigma);
        if outliers.is_empty() {
            log::info!(
                "Outlier removal on {} converged after {iterations} iterations; {} samples replaced",
                series.name,
                replaced.len()
            );
            return Ok(OutlierRemoval {
                series: series.with_values(values),
                converged: true,
                iterations,
                replaced,
            });
        }
        if seen.contains(&outliers) {
            log::warn!(
                "Outlier removal on {} did not converge; the same {} outliers reappeared after {iterations} iterations",
                series.name,
                outliers.len()
            );
            return Ok(OutlierRemoval {
                series: series.with_values(values),
                converged: false,
                iterations,
                replaced,
            });
        }

        let (knots_x, knots_y): (Vec<f64>, Vec<f64>) = series
            .times
            .iter()
            .zip(values.iter())
            .enumerate()
            .filter(|(idx, _)| !outliers.contains(*idx))
            .map(|(_, (t, v))| (*t, *v))
            .unzip();
        let spline = CubicSpline::new(&knots_x, &knots_y)?;
        for idx in outliers.iter() {
            values[idx] = spline.eval(series.times[idx]);
        }

        replaced.union_with(&outliers);
        seen.push(outliers);
        iterations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_single_spike() {
        let series = TimeSeries::new("X1:RANGE", 0.0, 1.0, array![1.0, 2.0, 3.0, 100.0, 4.0, 5.0]);
        let initial = find_outliers(series.values.view(), 2.0);
        assert_eq!(initial.iter().collect::<Vec<_>>(), vec![3]);

        let result = remove_outliers(&series, 2.0).unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.series.len(), series.len());
        assert_eq!(result.series.times, series.times);
        let fixed = result.series.values[3];
        assert!(fixed > 3.0 && fixed < 4.0, "replaced value {fixed} not between neighbours");
        assert_eq!(result.series.values[0], 1.0);
        assert!(find_outliers(result.series.values.view(), 2.0).is_empty());
    }

    #[test]
    fn test_clean_series_unchanged() {
        let series = TimeSeries::new("X1:RANGE", 0.0, 1.0, array![1.0, 1.1, 0.9, 1.0, 1.05]);
        let result = remove_outliers(&series, 3.0).unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.series, series);
    }

    #[test]
    fn test_flat_series_has_no_outliers() {
        let series = TimeSeries::new("X1:FLAT", 0.0, 1.0, array![5.0, 5.0, 5.0, 5.0]);
        assert!(find_outliers(series.values.view(), 0.5).is_empty());
    }

    #[test]
    fn test_too_few_clean_samples() {
        // Tiny sigma flags almost everything, leaving too few knots for a cubic
        let series = TimeSeries::new("X1:RANGE", 0.0, 1.0, array![0.0, 10.0, 0.0, 10.0, 0.0]);
        let result = remove_outliers(&series, 0.1);
        assert!(matches!(result, Err(DataError::Interpolation(_))));
    }
}
