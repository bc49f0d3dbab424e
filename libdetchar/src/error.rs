use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SplineError {
    #[error("Cubic spline requires at least {min} knots, but only {0} were given", min=crate::constants::MIN_SPLINE_KNOTS)]
    TooFewKnots(usize),
    #[error("Cubic spline knots must be strictly increasing; knot {0} is out of order")]
    NonIncreasingKnots(usize),
    #[error("Cubic spline was given {0} abscissae but {1} ordinates")]
    LengthMismatch(usize, usize),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Mismatch {
    #[error("it has {found} samples but the reference has {expected}")]
    Length { expected: usize, found: usize },
    #[error("sample {index} is at {found} s but the reference sample is at {expected} s")]
    Time {
        index: usize,
        expected: f64,
        found: f64,
    },
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Channel {0} could not be found in the data source")]
    ChannelNotFound(String),
    #[error("Channel {0} returned no data for the requested span")]
    EmptyChannel(String),
    #[error("Channel {channel} is not aligned with the reference: {mismatch}")]
    Misaligned { channel: String, mismatch: Mismatch },
    #[error("Channel {0} contains NaN or infinite values and cannot be normalized")]
    NonFinite(String),
    #[error("Channel {channel} changed sample rate from {expected} Hz to {found} Hz between segments")]
    SampleRateMismatch {
        channel: String,
        expected: f64,
        found: f64,
    },
    #[error("Flag {0} could not be found in the data source")]
    FlagNotFound(String),
    #[error("No analyzable segments remain between {0} and {1}")]
    NoSegments(i64, i64),
    #[error("Segment table for flag {0} is malformed; expected an N x 2 table")]
    BadSegmentTable(String),
    #[error("Interpolation over channel data failed: {0}")]
    Interpolation(#[from] SplineError),
    #[error("Data source failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Data source failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No auxiliary channels were requested; give a channel list, a channel file, or a channel pattern")]
    NoChannels,
    #[error("No usable (non-flat) auxiliary channels remain; the regression needs at least one feature column")]
    NoActiveChannels,
    #[error("Reference channel {0} is flat over the analyzed span and cannot be normalized")]
    FlatReference(String),
    #[error("Cross-validation needs between 2 and {1} folds, but {0} were requested")]
    InvalidFolds(usize, usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid span: end ({1}) must be after start ({0})")]
    InvalidSpan(i64, i64),
    #[error("Config has an invalid number of threads {0}; must be at least 1")]
    InvalidThreads(i32),
    #[error("Config has an invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Plot backend failed: {0}")]
    Backend(String),
    #[error("Plot label rendering failed: {0}")]
    Label(String),
    #[error("Plotting failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum HDF5WriterError {
    #[error("HDF5Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("HDF5Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HDF5Writer could not encode string {0:?} as UTF-8 HDF5 text")]
    BadString(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Report failed to format output: {0}")]
    FormatError(#[from] std::fmt::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to data error: {0}")]
    DataError(#[from] DataError),
    #[error("Processor failed due to configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to plotting error: {0}")]
    PlotError(#[from] PlotError),
    #[error("Processor failed due to HDF5Writer error: {0}")]
    HDFError(#[from] HDF5WriterError),
    #[error("Processor failed due to report error: {0}")]
    ReportError(#[from] ReportError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to lasso fit error: {0}")]
    FitError(#[from] linfa_elasticnet::ElasticNetError),
    #[error("Processor failed because plotting worker {0} panicked")]
    WorkerPanic(usize),
}
