use ndarray::{concatenate, Array1, Axis};

use super::error::{DataError, Mismatch};

/// A sampled channel: parallel arrays of GPS sample times and values.
///
/// Sample times are kept explicitly rather than derived from a start time so that series
/// stitched together from disjoint segments keep their true timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub sample_rate: f64,
    pub times: Array1<f64>,
    pub values: Array1<f64>,
}

impl TimeSeries {
    /// Create a regularly sampled series starting at t0
    pub fn new(name: &str, t0: f64, sample_rate: f64, values: Array1<f64>) -> Self {
        let dt = 1.0 / sample_rate;
        let times = Array1::from_shape_fn(values.len(), |idx| t0 + idx as f64 * dt);
        Self {
            name: name.to_string(),
            sample_rate,
            times,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Length of a single sample in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// The samples with start <= t < end
    pub fn crop(&self, start: f64, end: f64) -> Self {
        let first = self.times.iter().position(|t| *t >= start).unwrap_or(self.len());
        let last = self.times.iter().position(|t| *t >= end).unwrap_or(self.len());
        let last = last.max(first);
        Self {
            name: self.name.clone(),
            sample_rate: self.sample_rate,
            times: self.times.slice(ndarray::s![first..last]).to_owned(),
            values: self.values.slice(ndarray::s![first..last]).to_owned(),
        }
    }

    /// Append another chunk of the same channel (typically the next segment)
    pub fn append(&mut self, other: &TimeSeries) -> Result<(), DataError> {
        if self.is_empty() {
            self.sample_rate = other.sample_rate;
        } else if !other.is_empty() && self.sample_rate != other.sample_rate {
            return Err(DataError::SampleRateMismatch {
                channel: self.name.clone(),
                expected: self.sample_rate,
                found: other.sample_rate,
            });
        }
        self.times = concatenate(Axis(0), &[self.times.view(), other.times.view()])
            .map_err(|_| DataError::EmptyChannel(self.name.clone()))?;
        self.values = concatenate(Axis(0), &[self.values.view(), other.values.view()])
            .map_err(|_| DataError::EmptyChannel(self.name.clone()))?;
        Ok(())
    }

    /// Check that this series samples the same instants as the reference.
    ///
    /// Sample times may differ by less than half a reference sample.
    pub fn check_aligned(&self, reference: &TimeSeries) -> Result<(), DataError> {
        if self.len() != reference.len() {
            return Err(DataError::Misaligned {
                channel: self.name.clone(),
                mismatch: Mismatch::Length {
                    expected: reference.len(),
                    found: self.len(),
                },
            });
        }
        let tolerance = 0.5 * reference.dt();
        let shifted = reference
            .times
            .iter()
            .zip(self.times.iter())
            .position(|(expected, found)| (expected - found).abs() >= tolerance);
        match shifted {
            Some(index) => Err(DataError::Misaligned {
                channel: self.name.clone(),
                mismatch: Mismatch::Time {
                    index,
                    expected: reference.times[index],
                    found: self.times[index],
                },
            }),
            None => Ok(()),
        }
    }

    /// A copy of this series with the values replaced
    pub fn with_values(&self, values: Array1<f64>) -> Self {
        Self {
            name: self.name.clone(),
            sample_rate: self.sample_rate,
            times: self.times.clone(),
            values,
        }
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// A series is flat when it never changes value
    pub fn is_flat(&self) -> bool {
        self.min() == self.max()
    }

    /// Size of the sample payload in bytes, used for logging
    pub fn size_bytes(&self) -> usize {
        2 * self.len() * std::mem::size_of::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_crop_and_append() {
        let series = TimeSeries::new("X1:TEST", 100.0, 2.0, array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut head = series.crop(100.0, 101.0);
        assert_eq!(head.values, array![0.0, 1.0]);
        let tail = series.crop(102.0, 110.0);
        assert_eq!(tail.times, array![102.0, 102.5]);
        head.append(&tail).unwrap();
        assert_eq!(head.values, array![0.0, 1.0, 4.0, 5.0]);
        assert_eq!(head.times, array![100.0, 100.5, 102.0, 102.5]);
    }

    #[test]
    fn test_append_rate_mismatch() {
        let mut a = TimeSeries::new("X1:TEST", 0.0, 1.0, array![1.0, 2.0]);
        let b = TimeSeries::new("X1:TEST", 2.0, 16.0, array![1.0, 2.0]);
        assert!(matches!(
            a.append(&b),
            Err(DataError::SampleRateMismatch { .. })
        ));
    }

    #[test]
    fn test_alignment() {
        let reference = TimeSeries::new("X1:REF", 0.0, 1.0, array![1.0, 2.0, 3.0, 4.0, 5.0]);
        let jittered = TimeSeries::new("X1:JITTER", 0.2, 1.0, array![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(jittered.check_aligned(&reference).is_ok());

        let shifted = TimeSeries::new("X1:SHIFT", 0.5, 1.0, array![1.0, 2.0, 3.0, 4.0, 5.0]);
        match shifted.check_aligned(&reference) {
            Err(DataError::Misaligned { channel, mismatch }) => {
                assert_eq!(channel, "X1:SHIFT");
                assert_eq!(
                    mismatch,
                    Mismatch::Time {
                        index: 0,
                        expected: 0.0,
                        found: 0.5
                    }
                );
            }
            other => panic!("expected a time mismatch, got {other:?}"),
        }

        let short = TimeSeries::new("X1:SHORT", 0.0, 1.0, array![1.0, 2.0]);
        assert!(matches!(
            short.check_aligned(&reference),
            Err(DataError::Misaligned {
                mismatch: Mismatch::Length { expected: 5, found: 2 },
                ..
            })
        ));
    }

    #[test]
    fn test_flat() {
        assert!(TimeSeries::new("a", 0.0, 1.0, array![5.0, 5.0, 5.0, 5.0]).is_flat());
        assert!(!TimeSeries::new("b", 0.0, 1.0, array![1.0, 2.0, 1.0, 2.0]).is_flat());
    }
}
