use super::config::Direction;
use super::segments::{Segment, SegmentList};
use super::time_series::TimeSeries;

/// A sample at which a channel passed through a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub index: usize,
    pub time: f64,
    pub value: f64,
    pub rising: bool,
}

/// Find the samples where the series crosses threshold.
///
/// A rising crossing has the previous sample below threshold and the current one at or
/// above it; a falling crossing is the converse.
pub fn find_crossings(series: &TimeSeries, threshold: f64, direction: Direction) -> Vec<Crossing> {
    let values = &series.values;
    let mut crossings = Vec::new();
    for idx in 1..values.len() {
        let (prev, curr) = (values[idx - 1], values[idx]);
        let rising = prev < threshold && curr >= threshold;
        let falling = prev >= threshold && curr < threshold;
        let keep = match direction {
            Direction::Rising => rising,
            Direction::Falling => falling,
            Direction::Both => rising || falling,
        };
        if keep {
            crossings.push(Crossing {
                index: idx,
                time: series.times[idx],
                value: curr,
                rising,
            });
        }
    }
    crossings
}

/// Time covered by samples at or above threshold, each sample lasting one sample period
pub fn segments_above(series: &TimeSeries, threshold: f64) -> SegmentList {
    let dt = series.dt();
    let segments = series
        .times
        .iter()
        .zip(series.values.iter())
        .filter(|(_, v)| **v >= threshold)
        .map(|(t, _)| Segment::new(*t, t + dt))
        .collect();
    SegmentList::new(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn series() -> TimeSeries {
        TimeSeries::new("X1:DOOR", 100.0, 1.0, array![0.0, 2.0, 3.0, 0.5, 1.0, 4.0])
    }

    #[test]
    fn test_crossing_directions() {
        let s = series();
        let rising = find_crossings(&s, 1.0, Direction::Rising);
        assert_eq!(rising.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 4]);
        assert!(rising.iter().all(|c| c.rising));

        let falling = find_crossings(&s, 1.0, Direction::Falling);
        assert_eq!(falling.len(), 1);
        assert_eq!(falling[0].index, 3);
        assert_eq!(falling[0].time, 103.0);
        assert!(!falling[0].rising);

        assert_eq!(find_crossings(&s, 1.0, Direction::Both).len(), 3);
    }

    #[test]
    fn test_segments_above() {
        let s = series();
        let above = segments_above(&s, 1.0);
        let table: Vec<(f64, f64)> = above.iter().map(|seg| (seg.start, seg.end)).collect();
        assert_eq!(table, vec![(101.0, 103.0), (104.0, 106.0)]);
        assert_eq!(above.livetime(), 4.0);
    }

    #[test]
    fn test_never_crosses() {
        let s = series();
        assert!(find_crossings(&s, 10.0, Direction::Both).is_empty());
        assert!(segments_above(&s, 10.0).is_empty());
    }
}
