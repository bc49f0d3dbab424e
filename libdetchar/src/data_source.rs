use std::path::{Path, PathBuf};

use fxhash::FxHashMap;
use hdf5::File;

use super::error::DataError;
use super::segments::SegmentList;
use super::time_series::TimeSeries;

const CHANNELS_NAME: &str = "channels";
const SEGMENTS_NAME: &str = "segments";
const T0_ATTR: &str = "t0";
const SAMPLE_RATE_ATTR: &str = "sample_rate";

/// The collaborator which provides channel data, channel discovery, and state segments.
///
/// Any failure to produce data for a requested channel is an error; callers treat it as
/// fatal for the run.
pub trait DataSource {
    /// Fetch the samples of a channel with start <= t < end
    fn fetch(&self, channel: &str, start: f64, end: f64) -> Result<TimeSeries, DataError>;

    /// List the channels whose names match a wildcard pattern (`*` and `?`)
    fn find_channels(&self, pattern: &str) -> Result<Vec<String>, DataError>;

    /// The segments during which a state flag was active, restricted to [start, end)
    fn query_flag(&self, flag: &str, start: f64, end: f64) -> Result<SegmentList, DataError>;
}

/// A data source held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    channels: FxHashMap<String, TimeSeries>,
    flags: FxHashMap<String, SegmentList>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_series(&mut self, series: TimeSeries) {
        self.channels.insert(series.name.clone(), series);
    }

    pub fn add_flag(&mut self, flag: &str, segments: SegmentList) {
        self.flags.insert(flag.to_string(), segments);
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, channel: &str, start: f64, end: f64) -> Result<TimeSeries, DataError> {
        let series = self
            .channels
            .get(channel)
            .ok_or_else(|| DataError::ChannelNotFound(channel.to_string()))?;
        let cropped = series.crop(start, end);
        if cropped.is_empty() {
            return Err(DataError::EmptyChannel(channel.to_string()));
        }
        Ok(cropped)
    }

    fn find_channels(&self, pattern: &str) -> Result<Vec<String>, DataError> {
        let mut names: Vec<String> = self
            .channels
            .keys()
            .filter(|name| wildcard_match(pattern, name))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn query_flag(&self, flag: &str, start: f64, end: f64) -> Result<SegmentList, DataError> {
        let segments = self
            .flags
            .get(flag)
            .ok_or_else(|| DataError::FlagNotFound(flag.to_string()))?;
        Ok(segments.intersect(&SegmentList::span(start, end)))
    }
}

/// A data archive stored in an HDF5 file.
///
/// The archive layout is
///
/// ```text
/// archive.h5
/// channels
/// |---- <channel name>(dset) - t0, sample_rate
/// segments
/// |---- <flag name>(dset, N x 2 of start, end)
/// ```
#[derive(Debug)]
pub struct Hdf5Source {
    file_handle: File,
    path: PathBuf,
}

impl Hdf5Source {
    pub fn open(path: &Path) -> Result<Self, DataError> {
        if !path.exists() {
            return Err(DataError::IOError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("data archive {} does not exist", path.display()),
            )));
        }
        Ok(Self {
            file_handle: File::open(path)?,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for Hdf5Source {
    fn fetch(&self, channel: &str, start: f64, end: f64) -> Result<TimeSeries, DataError> {
        let channels = self.file_handle.group(CHANNELS_NAME)?;
        let dataset = channels
            .dataset(channel)
            .map_err(|_| DataError::ChannelNotFound(channel.to_string()))?;
        let t0 = dataset.attr(T0_ATTR)?.read_scalar::<f64>()?;
        let sample_rate = dataset.attr(SAMPLE_RATE_ATTR)?.read_scalar::<f64>()?;
        let values = dataset.read_1d::<f64>()?;
        let series = TimeSeries::new(channel, t0, sample_rate, values).crop(start, end);
        if series.is_empty() {
            return Err(DataError::EmptyChannel(channel.to_string()));
        }
        Ok(series)
    }

    fn find_channels(&self, pattern: &str) -> Result<Vec<String>, DataError> {
        let channels = self.file_handle.group(CHANNELS_NAME)?;
        let mut names: Vec<String> = channels
            .member_names()?
            .into_iter()
            .filter(|name| wildcard_match(pattern, name))
            .collect();
        names.sort();
        Ok(names)
    }

    fn query_flag(&self, flag: &str, start: f64, end: f64) -> Result<SegmentList, DataError> {
        let segments = self.file_handle.group(SEGMENTS_NAME)?;
        let dataset = segments
            .dataset(flag)
            .map_err(|_| DataError::FlagNotFound(flag.to_string()))?;
        let table = dataset.read_2d::<f64>()?;
        let list = SegmentList::from_table(&table)
            .ok_or_else(|| DataError::BadSegmentTable(flag.to_string()))?;
        Ok(list.intersect(&SegmentList::span(start, end)))
    }
}

/// Shell-style wildcard matching where `*` matches any run of characters and `?` any one
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    // Position of the last star and the text position it was tried against
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
