use ndarray::Array2;

use super::config::Config;
use super::data_source::DataSource;
use super::error::DataError;

/// A half-open GPS interval [start, end)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn intersect(&self, other: &Segment) -> Option<Segment> {
        let seg = Segment::new(self.start.max(other.start), self.end.min(other.end));
        if seg.is_empty() {
            None
        } else {
            Some(seg)
        }
    }
}

/// A sorted, non-overlapping list of segments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentList {
    segments: Vec<Segment>,
}

impl SegmentList {
    /// Build a list from arbitrary segments; empty segments are dropped and the rest coalesced
    pub fn new(segments: Vec<Segment>) -> Self {
        let mut list = Self { segments };
        list.coalesce();
        list
    }

    /// A list containing the single span [start, end)
    pub fn span(start: f64, end: f64) -> Self {
        Self::new(vec![Segment::new(start, end)])
    }

    /// Read a segment list from an N x 2 table of (start, end) rows
    pub fn from_table(table: &Array2<f64>) -> Option<Self> {
        if table.ncols() != 2 {
            return None;
        }
        Some(Self::new(
            table
                .rows()
                .into_iter()
                .map(|row| Segment::new(row[0], row[1]))
                .collect(),
        ))
    }

    /// The list as an N x 2 table of (start, end) rows
    pub fn to_table(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.segments.len(), 2), |(row, col)| {
            if col == 0 {
                self.segments[row].start
            } else {
                self.segments[row].end
            }
        })
    }

    /// Sort and merge overlapping or touching segments
    pub fn coalesce(&mut self) {
        self.segments.retain(|seg| !seg.is_empty());
        self.segments
            .sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));
        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for seg in self.segments.drain(..) {
            match merged.last_mut() {
                Some(last) if seg.start <= last.end => last.end = last.end.max(seg.end),
                _ => merged.push(seg),
            }
        }
        self.segments = merged;
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
        self.coalesce();
    }

    /// Intersection of two lists
    pub fn intersect(&self, other: &SegmentList) -> SegmentList {
        let mut result = Vec::new();
        for a in self.segments.iter() {
            for b in other.segments.iter() {
                if let Some(seg) = a.intersect(b) {
                    result.push(seg);
                }
            }
        }
        SegmentList::new(result)
    }

    /// Total time covered by the list
    pub fn livetime(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Resolve the segments to analyze for a configuration.
///
/// Without a state flag the whole [start, end) span is analyzed. With a flag, the active
/// segments of the flag are queried from the source and restricted to the span. Having
/// nothing left to analyze is an error.
pub fn resolve_segments(
    config: &Config,
    source: &dyn DataSource,
) -> Result<SegmentList, DataError> {
    let span = SegmentList::span(config.start as f64, config.end as f64);
    let segments = match &config.state_flag {
        Some(flag) => {
            let active = source.query_flag(flag, config.start as f64, config.end as f64)?;
            log::info!(
                "Flag {flag} is active for {} of {} seconds",
                active.intersect(&span).livetime(),
                span.livetime()
            );
            active.intersect(&span)
        }
        None => span,
    };
    if segments.is_empty() {
        return Err(DataError::NoSegments(config.start, config.end));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce() {
        let list = SegmentList::new(vec![
            Segment::new(10.0, 20.0),
            Segment::new(0.0, 5.0),
            Segment::new(5.0, 7.0),
            Segment::new(15.0, 25.0),
            Segment::new(30.0, 30.0),
        ]);
        let segs: Vec<Segment> = list.iter().copied().collect();
        assert_eq!(segs, vec![Segment::new(0.0, 7.0), Segment::new(10.0, 25.0)]);
        assert_eq!(list.livetime(), 22.0);
    }

    #[test]
    fn test_intersect() {
        let a = SegmentList::new(vec![Segment::new(0.0, 10.0), Segment::new(20.0, 30.0)]);
        let b = SegmentList::span(5.0, 25.0);
        let c = a.intersect(&b);
        assert_eq!(c.to_table(), ndarray::array![[5.0, 10.0], [20.0, 25.0]]);
    }

    #[test]
    fn test_table() {
        let table = ndarray::array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(SegmentList::from_table(&table).unwrap().to_table(), table);
        assert!(SegmentList::from_table(&ndarray::array![[1.0, 2.0, 3.0]]).is_none());
    }
}
