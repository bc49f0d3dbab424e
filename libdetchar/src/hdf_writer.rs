use hdf5::types::VarLenUnicode;
use hdf5::{File, Group};
use ndarray::{Array1, ArrayView1};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::constants::FORMAT_VERSION;
use super::error::HDF5WriterError;
use super::lasso::{FitMode, LassoFit};
use super::ranking::Ranking;
use super::segments::SegmentList;

const LASSO_NAME: &str = "lasso";
const CROSS_VALIDATION_NAME: &str = "cross_validation";
const SEGMENTS_NAME: &str = "segments";

// Structure of lasso.h5
// lasso - reference, start, end, alpha, mode, r_squared, threshold, version
// |---- channels(dset), coefficients(dset)
// |---- times(dset), reference(dset), prediction(dset)
// |---- flat_channels(dset), useful_channels(dset)
// |---- cross_validation
// |    |---- alphas(dset), mean_mse(dset)
//
// Structure of crossings.h5 / overflows.h5
// <channel> - count, threshold (crossings only), version
// |---- segments(dset, N x 2)

/// Metadata written alongside a lasso fit
#[derive(Debug, Clone)]
pub struct LassoSummary<'a> {
    pub reference: &'a str,
    pub start: i64,
    pub end: i64,
    pub times: ArrayView1<'a, f64>,
    pub reference_values: ArrayView1<'a, f64>,
}

fn to_unicode(text: &str) -> Result<VarLenUnicode, HDF5WriterError> {
    VarLenUnicode::from_str(text).map_err(|_| HDF5WriterError::BadString(text.to_string()))
}

fn to_unicode_array<'a>(
    texts: impl Iterator<Item = &'a str>,
) -> Result<Array1<VarLenUnicode>, HDF5WriterError> {
    texts.map(to_unicode).collect::<Result<Vec<_>, _>>().map(Array1::from)
}

fn write_string_attr(group: &Group, name: &str, value: &str) -> Result<(), HDF5WriterError> {
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&to_unicode(value)?)?;
    Ok(())
}

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing analysis results.
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
    path: PathBuf,
    version: String,
    n_groups: usize,
}

impl HDFWriter {
    /// Create the writer, opening (truncating) a file at path
    pub fn new(path: &Path) -> Result<Self, HDF5WriterError> {
        let file_handle = File::create(path)?;
        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
            version: format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION),
            n_groups: 0,
        })
    }

    /// Write a lasso fit and its ranking into the `lasso` group
    pub fn write_lasso(
        &mut self,
        summary: &LassoSummary,
        fit: &LassoFit,
        ranking: &Ranking,
    ) -> Result<(), HDF5WriterError> {
        let group = self.file_handle.create_group(LASSO_NAME)?;
        write_string_attr(&group, "reference", summary.reference)?;
        write_string_attr(&group, "mode", fit.result.mode.label())?;
        write_string_attr(&group, "version", &self.version)?;
        group
            .new_attr::<i64>()
            .create("start")?
            .write_scalar(&summary.start)?;
        group
            .new_attr::<i64>()
            .create("end")?
            .write_scalar(&summary.end)?;
        group
            .new_attr::<f64>()
            .create("alpha")?
            .write_scalar(&fit.result.alpha)?;
        group
            .new_attr::<f64>()
            .create("r_squared")?
            .write_scalar(&fit.r_squared)?;
        group
            .new_attr::<f64>()
            .create("threshold")?
            .write_scalar(&ranking.threshold)?;

        // Full table in ranked order
        let names = to_unicode_array(ranking.channels.iter().map(|c| c.name.as_str()))?;
        let coefficients: Array1<f64> = ranking.channels.iter().map(|c| c.coefficient).collect();
        group
            .new_dataset_builder()
            .with_data(&names)
            .create("channels")?;
        group
            .new_dataset_builder()
            .with_data(&coefficients)
            .create("coefficients")?;
        group
            .new_dataset_builder()
            .with_data(summary.times)
            .create("times")?;
        group
            .new_dataset_builder()
            .with_data(summary.reference_values)
            .create("reference")?;
        group
            .new_dataset_builder()
            .with_data(&fit.prediction)
            .create("prediction")?;

        let flat: Vec<&str> = ranking
            .channels
            .iter()
            .filter(|c| c.is_flat())
            .map(|c| c.name.as_str())
            .collect();
        if !flat.is_empty() {
            group
                .new_dataset_builder()
                .with_data(&to_unicode_array(flat.into_iter())?)
                .create("flat_channels")?;
        }
        if ranking.has_useful() {
            group
                .new_dataset_builder()
                .with_data(&to_unicode_array(
                    ranking.useful().iter().map(|c| c.name.as_str()),
                )?)
                .create("useful_channels")?;
        }

        if let FitMode::CrossValidated(cv) = &fit.result.mode {
            let cv_group = group.create_group(CROSS_VALIDATION_NAME)?;
            cv_group
                .new_attr::<u64>()
                .create("n_folds")?
                .write_scalar(&(cv.n_folds as u64))?;
            cv_group
                .new_dataset_builder()
                .with_data(cv.alphas.as_slice())
                .create("alphas")?;
            cv_group
                .new_dataset_builder()
                .with_data(cv.mean_mse.as_slice())
                .create("mean_mse")?;
        }
        self.n_groups += 1;
        Ok(())
    }

    /// Write the segments found for one channel into a group named after it.
    ///
    /// Empty segment lists still get their group and count so absence is explicit.
    pub fn write_segments(
        &mut self,
        channel: &str,
        segments: &SegmentList,
        count: u64,
        threshold: Option<f64>,
    ) -> Result<(), HDF5WriterError> {
        let group = self.file_handle.create_group(channel)?;
        write_string_attr(&group, "version", &self.version)?;
        group
            .new_attr::<u64>()
            .create("count")?
            .write_scalar(&count)?;
        if let Some(threshold) = threshold {
            group
                .new_attr::<f64>()
                .create("threshold")?
                .write_scalar(&threshold)?;
        }
        if !segments.is_empty() {
            group
                .new_dataset_builder()
                .with_data(&segments.to_table())
                .create(SEGMENTS_NAME)?;
        }
        self.n_groups += 1;
        Ok(())
    }

    /// Flush and close the file, consuming the writer
    pub fn close(self) -> Result<(), HDF5WriterError> {
        self.file_handle.flush()?;
        log::info!(
            "{} result groups written to {}.",
            self.n_groups,
            self.path.display()
        );
        Ok(())
    }
}
