use std::cmp::Ordering;
use std::path::PathBuf;

use ndarray::Array1;

use super::constants::{HIGH_SEVERITY, MEDIUM_SEVERITY};
use super::features::{ChannelMatrix, FlatChannel};
use super::lasso::FitResult;

/// Qualitative bucket for the size of a channel's coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
    /// Flat channels and exactly-zero coefficients
    Neutral,
}

impl Severity {
    pub fn from_coefficient(coefficient: f64) -> Self {
        let magnitude = coefficient.abs();
        if coefficient == 0.0 {
            Self::Neutral
        } else if magnitude >= HIGH_SEVERITY {
            Self::High
        } else if magnitude >= MEDIUM_SEVERITY {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Neutral => "none",
        }
    }

    /// CSS class used by the HTML report
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::High => "danger",
            Self::Medium => "warning",
            Self::Low => "info",
            Self::Neutral => "neutral",
        }
    }
}

/// A channel's place in the results.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChannel {
    pub name: String,
    pub coefficient: f64,
    pub severity: Severity,
    /// Position in the original auxiliary channel list, used to break ties
    pub order: usize,
    /// Column of the ChannelMatrix; None for flat channels
    pub column: Option<usize>,
    /// Diagnostic plot, once rendered
    pub plot: Option<PathBuf>,
}

impl RankedChannel {
    pub fn is_flat(&self) -> bool {
        self.column.is_none()
    }
}

/// Ordering of the results table: active before flat, then descending |coefficient|,
/// then original channel order.
pub fn compare_ranked(a: &RankedChannel, b: &RankedChannel) -> Ordering {
    a.is_flat()
        .cmp(&b.is_flat())
        .then_with(|| b.coefficient.abs().total_cmp(&a.coefficient.abs()))
        .then_with(|| a.order.cmp(&b.order))
}

pub fn sort_ranked(channels: &mut [RankedChannel]) {
    channels.sort_by(compare_ranked);
}

/// Length of the longest prefix of active channels with |coefficient| >= threshold
pub fn useful_prefix_len(channels: &[RankedChannel], threshold: f64) -> usize {
    channels
        .iter()
        .take_while(|c| !c.is_flat() && c.coefficient.abs() >= threshold)
        .count()
}

/// The full results table and its useful prefix
#[derive(Debug, Clone)]
pub struct Ranking {
    pub channels: Vec<RankedChannel>,
    pub threshold: f64,
    useful: usize,
}

impl Ranking {
    /// Rank every channel of a fit plus the flat channels set aside by the preparer
    pub fn new(fit: &FitResult, matrix: &ChannelMatrix, flat: &[FlatChannel], threshold: f64) -> Self {
        let mut channels: Vec<RankedChannel> = fit
            .coefficients
            .iter()
            .enumerate()
            .map(|(column, (name, coefficient))| RankedChannel {
                name: name.clone(),
                coefficient: *coefficient,
                severity: Severity::from_coefficient(*coefficient),
                order: matrix.order[column],
                column: Some(column),
                plot: None,
            })
            .collect();
        channels.extend(flat.iter().map(|f| RankedChannel {
            name: f.name.clone(),
            coefficient: 0.0,
            severity: Severity::Neutral,
            order: f.order,
            column: None,
            plot: None,
        }));
        Self::from_channels(channels, threshold)
    }

    /// Sort arbitrary ranked channels and compute the useful prefix
    pub fn from_channels(mut channels: Vec<RankedChannel>, threshold: f64) -> Self {
        sort_ranked(&mut channels);
        let useful = useful_prefix_len(&channels, threshold);
        Self {
            channels,
            threshold,
            useful,
        }
    }

    pub fn useful(&self) -> &[RankedChannel] {
        &self.channels[..self.useful]
    }

    pub fn n_useful(&self) -> usize {
        self.useful
    }

    pub fn has_useful(&self) -> bool {
        self.useful > 0
    }

    /// Replace the useful channels with plotted versions, in any order.
    ///
    /// The table is re-sorted so arrival order does not matter.
    pub fn attach_plots(&mut self, plotted: Vec<RankedChannel>) {
        for channel in plotted {
            if let Some(slot) = self.channels.iter_mut().find(|c| c.name == channel.name) {
                *slot = channel;
            }
        }
        sort_ranked(&mut self.channels);
    }
}

/// Each useful channel's contribution `coefficient * normalized channel`
pub fn individual_contributions(useful: &[RankedChannel], matrix: &ChannelMatrix) -> Vec<Array1<f64>> {
    useful
        .iter()
        .filter_map(|c| c.column.map(|col| matrix.column(col).mapv(|v| v * c.coefficient)))
        .collect()
}

/// Running sums of the individual contributions: entry k is the sum of the first k + 1
pub fn cumulative_contributions(useful: &[RankedChannel], matrix: &ChannelMatrix) -> Vec<Array1<f64>> {
    let mut cumulative: Vec<Array1<f64>> = Vec::with_capacity(useful.len());
    for term in individual_contributions(useful, matrix) {
        let next = match cumulative.last() {
            Some(previous) => previous + &term,
            None => term,
        };
        cumulative.push(next);
    }
    cumulative
}
