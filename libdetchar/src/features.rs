use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::error::{ConfigurationError, DataError, Mismatch, ProcessorError};
use super::time_series::TimeSeries;

/// An auxiliary channel tagged at ingestion by whether it ever changes value.
///
/// Later stages branch on this tag rather than re-deriving flatness.
#[derive(Debug, Clone)]
pub enum Channel {
    Flat(TimeSeries),
    Active(TimeSeries),
}

impl Channel {
    pub fn classify(series: TimeSeries) -> Self {
        if series.is_flat() {
            Self::Flat(series)
        } else {
            Self::Active(series)
        }
    }

    pub fn series(&self) -> &TimeSeries {
        match self {
            Self::Flat(s) | Self::Active(s) => s,
        }
    }

    pub fn name(&self) -> &str {
        &self.series().name
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Self::Flat(_))
    }
}

/// Normalized active channels stacked column-wise.
///
/// Rows are samples (aligned with the reference), columns are channels.
#[derive(Debug, Clone)]
pub struct ChannelMatrix {
    pub names: Vec<String>,
    /// Position of each column's channel in the original auxiliary list
    pub order: Vec<usize>,
    pub data: Array2<f64>,
}

impl ChannelMatrix {
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn column(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.data.column(idx)
    }
}

/// A flat channel kept for reporting
#[derive(Debug, Clone)]
pub struct FlatChannel {
    pub name: String,
    pub order: usize,
    pub value: f64,
}

/// The output of the feature preparer
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    pub matrix: ChannelMatrix,
    pub flat: Vec<FlatChannel>,
}

/// Rescale to zero mean and unit (population) variance.
///
/// Returns None for a constant input, which has no scale.
pub fn normalize(values: ArrayView1<f64>) -> Option<Array1<f64>> {
    let mean = values.mean()?;
    let std = values.std(0.0);
    if std == 0.0 || !std.is_finite() {
        return None;
    }
    Some(values.mapv(|v| (v - mean) / std))
}

fn check_finite(series: &TimeSeries) -> Result<(), DataError> {
    if series.values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(DataError::NonFinite(series.name.clone()))
    }
}

/// Build the ChannelMatrix from tagged channels.
///
/// Flat channels are set aside; each active channel is normalized independently. Every
/// channel must be sampled at the same times as the reference.
pub fn prepare(
    channels: Vec<Channel>,
    reference: &TimeSeries,
) -> Result<PreparedFeatures, ProcessorError> {
    let mut names = Vec::new();
    let mut order = Vec::new();
    let mut columns: Vec<Array1<f64>> = Vec::new();
    let mut flat = Vec::new();

    for (idx, channel) in channels.into_iter().enumerate() {
        channel.series().check_aligned(reference)?;
        match channel {
            Channel::Flat(series) => flat.push(FlatChannel {
                value: series.values.first().copied().unwrap_or(0.0),
                name: series.name,
                order: idx,
            }),
            Channel::Active(series) => {
                check_finite(&series)?;
                let column = normalize(series.values.view())
                    .ok_or_else(|| DataError::NonFinite(series.name.clone()))?;
                names.push(series.name);
                order.push(idx);
                columns.push(column);
            }
        }
    }

    if columns.is_empty() {
        return Err(ConfigurationError::NoActiveChannels.into());
    }
    if !flat.is_empty() {
        log::info!(
            "{} flat channels will be reported without contribution",
            flat.len()
        );
    }

    let views: Vec<ArrayView1<f64>> = columns.iter().map(|c| c.view()).collect();
    let data = ndarray::stack(Axis(1), &views).map_err(|_| DataError::Misaligned {
        channel: names[0].clone(),
        mismatch: Mismatch::Length {
            expected: reference.len(),
            found: columns[0].len(),
        },
    })?;

    Ok(PreparedFeatures {
        matrix: ChannelMatrix { names, order, data },
        flat,
    })
}

/// Normalize the reference series; a flat reference cannot be explained by anything
pub fn normalize_reference(reference: &TimeSeries) -> Result<Array1<f64>, ProcessorError> {
    check_finite(reference)?;
    let normalized = normalize(reference.values.view())
        .ok_or_else(|| ConfigurationError::FlatReference(reference.name.clone()))?;
    Ok(normalized)
}
