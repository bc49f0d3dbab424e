use super::segments::{Segment, SegmentList};
use super::time_series::TimeSeries;

/// Overflow events found on one cumulative counter channel
#[derive(Debug, Clone, PartialEq)]
pub struct OverflowEvents {
    pub channel: String,
    /// Sum of the positive counter increments
    pub n_overflows: u64,
    /// Start time of every sample whose counter increased
    pub times: Vec<f64>,
    pub segments: SegmentList,
}

impl OverflowEvents {
    pub fn has_overflows(&self) -> bool {
        self.n_overflows > 0
    }
}

/// Find the samples where a cumulative overflow counter increased.
///
/// Counter decreases are resets of the front-end and are not events.
pub fn find_overflows(series: &TimeSeries) -> OverflowEvents {
    let dt = series.dt();
    let values = &series.values;
    let mut n_overflows = 0;
    let mut times = Vec::new();
    let mut resets = 0;
    for idx in 1..values.len() {
        let step = values[idx] - values[idx - 1];
        if step > 0.0 {
            n_overflows += step.round() as u64;
            times.push(series.times[idx]);
        } else if step < 0.0 {
            resets += 1;
        }
    }
    if resets > 0 {
        log::warn!("{} was reset {resets} times; resets were ignored", series.name);
    }
    let segments = SegmentList::new(times.iter().map(|t| Segment::new(*t, t + dt)).collect());
    OverflowEvents {
        channel: series.name.clone(),
        n_overflows,
        times,
        segments,
    }
}

/// Channels with overflows first, by descending count, then by name
pub fn sort_overflows(events: &mut [OverflowEvents]) {
    events.sort_by(|a, b| {
        b.n_overflows
            .cmp(&a.n_overflows)
            .then_with(|| a.channel.cmp(&b.channel))
    });
}
