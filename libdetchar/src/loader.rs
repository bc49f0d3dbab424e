use super::config::{Cadence, Config};
use super::data_source::DataSource;
use super::error::{ConfigurationError, DataError, ProcessorError};
use super::segments::SegmentList;
use super::time_series::TimeSeries;

/// The reference channel and auxiliary channels, fetched over the same segments
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub reference: TimeSeries,
    pub auxiliary: Vec<TimeSeries>,
}

impl LoadedData {
    pub fn size_bytes(&self) -> usize {
        self.reference.size_bytes()
            + self
                .auxiliary
                .iter()
                .map(TimeSeries::size_bytes)
                .sum::<usize>()
    }
}

/// Fetch a channel over every segment and stitch the pieces together.
///
/// The returned series keeps the requested (cadence-free) channel name.
pub fn fetch_segments(
    source: &dyn DataSource,
    channel: &str,
    cadence: Cadence,
    segments: &SegmentList,
) -> Result<TimeSeries, DataError> {
    let product = cadence.channel_name(channel);
    let mut stitched: Option<TimeSeries> = None;
    for seg in segments.iter() {
        let piece = source.fetch(&product, seg.start, seg.end)?;
        match stitched.as_mut() {
            Some(series) => series.append(&piece)?,
            None => stitched = Some(piece),
        }
    }
    let mut series = stitched.ok_or_else(|| DataError::EmptyChannel(channel.to_string()))?;
    series.name = channel.to_string();
    Ok(series)
}

/// Find the channels matching a pattern that have a data product at this cadence.
///
/// The pattern applies to channel names; the returned names carry no cadence suffix.
pub fn discover_channels(
    source: &dyn DataSource,
    pattern: &str,
    cadence: Cadence,
) -> Result<Vec<String>, DataError> {
    let products = source.find_channels(&cadence.channel_name(pattern))?;
    let names: Vec<String> = products
        .iter()
        .filter_map(|product| cadence.base_name(product))
        .map(String::from)
        .collect();
    log::info!("Pattern {pattern} matched {} channels", names.len());
    Ok(names)
}

/// Gather the auxiliary channel names from the explicit list, the channel file, and the
/// discovery pattern, preserving order and dropping duplicates and the reference itself.
pub fn resolve_channels(
    config: &Config,
    source: &dyn DataSource,
) -> Result<Vec<String>, ProcessorError> {
    let mut names: Vec<String> = config.lasso.channels.clone();
    names.extend(config.read_channel_file()?);
    if let Some(pattern) = &config.lasso.channel_pattern {
        names.extend(discover_channels(source, pattern, config.cadence)?);
    }

    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if name != config.lasso.reference_channel && !unique.contains(&name) {
            unique.push(name);
        }
    }
    if unique.is_empty() {
        return Err(ConfigurationError::NoChannels.into());
    }
    Ok(unique)
}

/// Load the reference channel and every auxiliary channel.
///
/// A failure to fetch any channel is fatal. All auxiliary channels must be sampled at the
/// same times as the reference.
pub fn load(
    source: &dyn DataSource,
    reference: &str,
    channels: &[String],
    cadence: Cadence,
    segments: &SegmentList,
) -> Result<LoadedData, DataError> {
    log::info!("Fetching reference channel {reference}...");
    let reference = fetch_segments(source, reference, cadence, segments)?;

    let mut auxiliary = Vec::with_capacity(channels.len());
    for channel in channels.iter() {
        let series = fetch_segments(source, channel, cadence, segments)?;
        series.check_aligned(&reference)?;
        auxiliary.push(series);
    }

    let data = LoadedData {
        reference,
        auxiliary,
    };
    log::info!(
        "Loaded {} auxiliary channels with {} samples each ({})",
        data.auxiliary.len(),
        data.reference.len(),
        human_bytes::human_bytes(data.size_bytes() as f64)
    );
    Ok(data)
}

/// Gather overflow counter channels from the explicit list and discovery pattern
pub fn resolve_overflow_channels(
    config: &Config,
    source: &dyn DataSource,
) -> Result<Vec<String>, ProcessorError> {
    let mut names = config.overflow.channels.clone();
    if let Some(pattern) = &config.overflow.channel_pattern {
        names.extend(discover_channels(source, pattern, Cadence::Raw)?);
    }
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    if unique.is_empty() {
        return Err(ConfigurationError::NoChannels.into());
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::MemorySource;
    use crate::segments::Segment;
    use ndarray::Array1;

    fn source() -> MemorySource {
        let mut source = MemorySource::new();
        let values = Array1::from_iter((0..100).map(|i| i as f64));
        source.add_series(TimeSeries::new("X1:REF", 0.0, 1.0, values.clone()));
        source.add_series(TimeSeries::new("X1:AUX", 0.0, 1.0, values.clone()));
        source.add_series(TimeSeries::new("X1:SHORT", 50.0, 1.0, values.slice(ndarray::s![..10]).to_owned()));
        source
    }

    #[test]
    fn test_load_over_segments() {
        let segments = SegmentList::new(vec![Segment::new(0.0, 10.0), Segment::new(20.0, 25.0)]);
        let data = load(&source(), "X1:REF", &["X1:AUX".to_string()], Cadence::Raw, &segments).unwrap();
        assert_eq!(data.reference.len(), 15);
        assert_eq!(data.auxiliary[0].times[10], 20.0);
    }

    #[test]
    fn test_missing_channel_is_fatal() {
        let segments = SegmentList::span(0.0, 10.0);
        let result = load(&source(), "X1:REF", &["X1:NOPE".to_string()], Cadence::Raw, &segments);
        assert!(matches!(result, Err(DataError::ChannelNotFound(_))));
    }

    #[test]
    fn test_misaligned() {
        let segments = SegmentList::span(0.0, 100.0);
        let result = load(&source(), "X1:REF", &["X1:SHORT".to_string()], Cadence::Raw, &segments);
        assert!(matches!(result, Err(DataError::Misaligned { .. })));
    }

    #[test]
    fn test_shifted_channel_is_misaligned() {
        let mut source = source();
        let values = Array1::from_iter((0..100).map(|i| i as f64));
        source.add_series(TimeSeries::new("X1:SHIFTED", 0.5, 1.0, values));
        let segments = SegmentList::span(0.0, 10.0);
        let result = load(&source, "X1:REF", &["X1:SHIFTED".to_string()], Cadence::Raw, &segments);
        assert!(matches!(
            result,
            Err(DataError::Misaligned {
                mismatch: crate::error::Mismatch::Time { index: 0, .. },
                ..
            })
        ));
    }

    #[test]
    fn test_pattern_under_trend_cadence() {
        let mut source = MemorySource::new();
        let values = Array1::from_iter((0..20).map(|i| (i * i % 7) as f64));
        for name in ["X1:REF", "X1:AUX"] {
            let product = Cadence::MinuteTrend.channel_name(name);
            source.add_series(TimeSeries::new(&product, 0.0, 1.0 / 60.0, values.clone()));
        }
        source.add_series(TimeSeries::new("X1:AUX", 0.0, 16.0, values.clone()));

        let mut config = Config {
            cadence: Cadence::MinuteTrend,
            ..Default::default()
        };
        config.lasso.reference_channel = "X1:REF".to_string();
        config.lasso.channel_pattern = Some("X1:*".to_string());
        let names = resolve_channels(&config, &source).unwrap();
        assert_eq!(names, vec!["X1:AUX"]);

        let segments = SegmentList::span(0.0, 1200.0);
        let data = load(&source, "X1:REF", &names, Cadence::MinuteTrend, &segments).unwrap();
        assert_eq!(data.auxiliary[0].name, "X1:AUX");
        assert_eq!(data.auxiliary[0].len(), 20);
    }

    #[test]
    fn test_raw_pattern_skips_trends() {
        let mut source = source();
        source.add_series(TimeSeries::new("X1:AUX.mean,m-trend", 0.0, 1.0 / 60.0, Array1::zeros(4)));
        let names = discover_channels(&source, "X1:A*", Cadence::Raw).unwrap();
        assert_eq!(names, vec!["X1:AUX"]);
    }

    #[test]
    fn test_resolve_channels() {
        let mut config = Config {
            cadence: Cadence::Raw,
            ..Default::default()
        };
        config.lasso.reference_channel = "X1:REF".to_string();
        config.lasso.channels = vec!["X1:AUX".to_string()];
        config.lasso.channel_pattern = Some("X1:*".to_string());
        let names = resolve_channels(&config, &source()).unwrap();
        assert_eq!(names, vec!["X1:AUX", "X1:SHORT"]);

        config.lasso.channels.clear();
        config.lasso.channel_pattern = None;
        assert!(matches!(
            resolve_channels(&config, &source()),
            Err(ProcessorError::ConfigurationError(ConfigurationError::NoChannels))
        ));
    }
}
