use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use ndarray::Array1;

use super::config::{Cadence, Config};
use super::constants::REPORT_NAME;
use super::crossings::{find_crossings, segments_above};
use super::data_source::{DataSource, Hdf5Source};
use super::error::ProcessorError;
use super::features::{normalize_reference, prepare, Channel, ChannelMatrix};
use super::hdf_writer::{HDFWriter, LassoSummary};
use super::lasso::{fit, LassoFit, LassoSettings};
use super::loader::{fetch_segments, load, resolve_channels, resolve_overflow_channels};
use super::outlier::remove_outliers;
use super::overflow::{find_overflows, sort_overflows};
use super::plots::{
    plot_file_name, render, ChannelFigure, ContributionFigure, CrossingFigure, ModelFigure,
};
use super::ranking::{cumulative_contributions, individual_contributions, RankedChannel, Ranking};
use super::report::{
    render_channel_table, render_crossing_table, render_crossings_html, render_lasso_html,
    render_overflow_html, render_overflow_table, write_text, LassoPlots, RunSummary,
};
use super::segments::{resolve_segments, SegmentList};
use super::worker_status::{Stage, WorkerStatus};

/// The analyses the processor can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    Lasso,
    Crossings,
    Overflow,
}

/// What a lasso run produced
#[derive(Debug, Clone)]
pub struct LassoOutput {
    pub fit: LassoFit,
    pub ranking: Ranking,
    pub report: PathBuf,
}

/// Read-only data shared by the plotting workers
struct PlotInputs {
    reference_name: String,
    t0: f64,
    times: Array1<f64>,
    reference: Array1<f64>,
    matrix: ChannelMatrix,
}

fn run_summary(config: &Config, title: String, segments: &SegmentList) -> RunSummary {
    RunSummary {
        title,
        start: config.start,
        end: config.end,
        state_flag: config.state_flag.clone(),
        cadence: format!("{:?}", config.cadence),
        segments: segments.clone(),
    }
}

/// Deal items round-robin into at most `n_workers` non-empty subsets
pub fn create_subsets<T: Clone>(items: &[T], n_workers: usize) -> Vec<Vec<T>> {
    let n_subsets = n_workers.clamp(1, items.len().max(1));
    let mut subsets: Vec<Vec<T>> = vec![Vec::new(); n_subsets];

    for (idx, item) in items.iter().enumerate() {
        subsets[idx % n_subsets].push(item.clone())
    }
    subsets.retain(|s| !s.is_empty());

    subsets
}

/// Render the diagnostic plots for a subset of channels
fn plot_subset(
    inputs: Arc<PlotInputs>,
    subset: Vec<RankedChannel>,
    plot_dir: PathBuf,
    counter: Arc<AtomicUsize>,
    total: usize,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<Vec<RankedChannel>, ProcessorError> {
    let mut plotted = Vec::with_capacity(subset.len());
    for mut channel in subset {
        if let Some(column) = channel.column {
            let figure = ChannelFigure {
                name: &channel.name,
                reference_name: &inputs.reference_name,
                coefficient: channel.coefficient,
                t0: inputs.t0,
                times: inputs.times.view(),
                reference: inputs.reference.view(),
                channel: inputs.matrix.column(column),
            };
            let path = render(
                &figure,
                &plot_dir.join(plot_file_name(channel.order, &channel.name)),
            )?;
            channel.plot = Some(path);
        }
        plotted.push(channel);
        let done = counter.fetch_add(1, Ordering::SeqCst) + 1;
        tx.send(WorkerStatus::new(done, total, worker_id, Stage::Plotting))?;
    }
    Ok(plotted)
}

/// Plot every useful channel on a pool of `n_workers` threads and attach the plots
fn plot_useful_channels(
    ranking: &mut Ranking,
    inputs: PlotInputs,
    plot_dir: &Path,
    n_workers: usize,
    tx: &Sender<WorkerStatus>,
) -> Result<(), ProcessorError> {
    let useful = ranking.useful().to_vec();
    let total = useful.len();
    let inputs = Arc::new(inputs);
    let counter = Arc::new(AtomicUsize::new(0));
    tx.send(WorkerStatus::new(0, total, 0, Stage::Plotting))?;

    let mut handles = Vec::new();
    for (worker_id, subset) in create_subsets(&useful, n_workers).into_iter().enumerate() {
        let inputs = inputs.clone();
        let counter = counter.clone();
        let tx = tx.clone();
        let plot_dir = plot_dir.to_path_buf();
        log::info!("Plotting worker {worker_id} takes {} channels", subset.len());
        handles.push(std::thread::spawn(move || {
            plot_subset(inputs, subset, plot_dir, counter, total, tx, worker_id)
        }));
    }

    // Every worker is joined before the first failure is reported
    let results: Vec<Result<Vec<RankedChannel>, ProcessorError>> = handles
        .into_iter()
        .enumerate()
        .map(|(worker_id, handle)| {
            handle
                .join()
                .unwrap_or_else(|_| Err(ProcessorError::WorkerPanic(worker_id)))
        })
        .collect();

    let mut plotted = Vec::with_capacity(total);
    for result in results {
        plotted.extend(result?);
    }
    ranking.attach_plots(plotted);
    // Workers may report out of order, so the final count is sent once all have joined
    tx.send(WorkerStatus::new(
        counter.load(Ordering::SeqCst),
        total,
        0,
        Stage::Plotting,
    ))?;
    Ok(())
}

/// Model and contribution plots over the useful channels
fn plot_summaries(
    ranking: &Ranking,
    inputs: &PlotInputs,
    fit: &LassoFit,
    plot_dir: &Path,
) -> Result<LassoPlots, ProcessorError> {
    let model = render(
        &ModelFigure {
            reference_name: &inputs.reference_name,
            t0: inputs.t0,
            times: inputs.times.view(),
            reference: inputs.reference.view(),
            prediction: fit.prediction.view(),
            r_squared: fit.r_squared,
        },
        &plot_dir.join("model.png"),
    )?;

    let useful = ranking.useful();
    let cumulative = cumulative_contributions(useful, &inputs.matrix);
    let individual = individual_contributions(useful, &inputs.matrix);

    let cumulative_plot = render(
        &ContributionFigure {
            title: "Cumulative contributions",
            reference_name: &inputs.reference_name,
            t0: inputs.t0,
            times: inputs.times.view(),
            reference: inputs.reference.view(),
            curves: useful
                .iter()
                .zip(cumulative.iter())
                .enumerate()
                .map(|(k, (c, curve))| (format!("top {}: + {}", k + 1, c.name), curve.view()))
                .collect(),
        },
        &plot_dir.join("cumulative.png"),
    )?;
    let individual_plot = render(
        &ContributionFigure {
            title: "Individual contributions",
            reference_name: &inputs.reference_name,
            t0: inputs.t0,
            times: inputs.times.view(),
            reference: inputs.reference.view(),
            curves: useful
                .iter()
                .zip(individual.iter())
                .map(|(c, curve)| (c.name.clone(), curve.view()))
                .collect(),
        },
        &plot_dir.join("individual.png"),
    )?;

    Ok(LassoPlots {
        model: Some(model),
        cumulative: Some(cumulative_plot),
        individual: Some(individual_plot),
    })
}

/// Rank auxiliary channels by how well they explain the reference channel.
///
/// Segments, channel data, outlier removal, normalization, the lasso fit, ranking, plots,
/// and the text/HDF5/HTML artifacts, in that order.
pub fn process_lasso(
    config: &Config,
    source: &dyn DataSource,
    tx: &Sender<WorkerStatus>,
) -> Result<LassoOutput, ProcessorError> {
    let lasso_config = &config.lasso;
    let output_dir = config.get_output_directory()?;

    tx.send(WorkerStatus::new(0, 1, 0, Stage::Loading))?;
    let segments = resolve_segments(config, source)?;
    log::info!(
        "Analyzing {} segments covering {} s",
        segments.len(),
        segments.livetime()
    );
    let channels = resolve_channels(config, source)?;
    let data = load(
        source,
        &lasso_config.reference_channel,
        &channels,
        config.cadence,
        &segments,
    )?;
    tx.send(WorkerStatus::new(1, 1, 0, Stage::Loading))?;

    tx.send(WorkerStatus::new(0, 1, 0, Stage::Cleaning))?;
    let reference = match lasso_config.outlier_sigma {
        Some(sigma) => {
            let cleaned = remove_outliers(&data.reference, sigma)?;
            if !cleaned.converged {
                log::warn!("Continuing with partially cleaned reference channel");
            }
            cleaned.series
        }
        None => data.reference.clone(),
    };
    tx.send(WorkerStatus::new(1, 1, 0, Stage::Cleaning))?;

    tx.send(WorkerStatus::new(0, 1, 0, Stage::Fitting))?;
    let prepared = prepare(
        data.auxiliary.into_iter().map(Channel::classify).collect(),
        &reference,
    )?;
    let y = normalize_reference(&reference)?;
    let settings = LassoSettings::from_alpha(lasso_config.alpha, lasso_config.n_folds);
    let lasso_fit = fit(&prepared.matrix, y.view(), &settings)?;
    log::info!(
        "Lasso selected {} of {} channels (alpha = {:.3e}, R^2 = {:.3})",
        lasso_fit.result.n_selected(),
        prepared.matrix.ncols(),
        lasso_fit.result.alpha,
        lasso_fit.r_squared
    );
    let mut ranking = Ranking::new(
        &lasso_fit.result,
        &prepared.matrix,
        &prepared.flat,
        lasso_config.threshold,
    );
    tx.send(WorkerStatus::new(1, 1, 0, Stage::Fitting))?;

    let inputs = PlotInputs {
        reference_name: lasso_config.reference_channel.clone(),
        t0: config.start as f64,
        times: reference.times.clone(),
        reference: y.clone(),
        matrix: prepared.matrix,
    };
    let plots = if ranking.has_useful() {
        let plot_dir = config.get_plot_directory()?;
        let plots = plot_summaries(&ranking, &inputs, &lasso_fit, &plot_dir)?;
        plot_useful_channels(
            &mut ranking,
            inputs,
            &plot_dir,
            config.n_threads as usize,
            tx,
        )?;
        plots
    } else {
        log::info!(
            "No channel reached the threshold {}; skipping channel plots",
            ranking.threshold
        );
        LassoPlots::default()
    };

    tx.send(WorkerStatus::new(0, 3, 0, Stage::Reporting))?;
    write_text(&output_dir.join("channels.txt"), &render_channel_table(&ranking)?)?;
    tx.send(WorkerStatus::new(1, 3, 0, Stage::Reporting))?;

    let mut writer = HDFWriter::new(&output_dir.join("lasso.h5"))?;
    writer.write_lasso(
        &LassoSummary {
            reference: &lasso_config.reference_channel,
            start: config.start,
            end: config.end,
            times: reference.times.view(),
            reference_values: y.view(),
        },
        &lasso_fit,
        &ranking,
    )?;
    writer.close()?;
    tx.send(WorkerStatus::new(2, 3, 0, Stage::Reporting))?;

    let summary = run_summary(
        config,
        format!("Lasso of {}", lasso_config.reference_channel),
        &segments,
    );
    let report = output_dir.join(REPORT_NAME);
    write_text(
        &report,
        &render_lasso_html(
            &summary,
            &lasso_config.reference_channel,
            &lasso_fit,
            &ranking,
            &plots,
            &output_dir,
        )?,
    )?;
    tx.send(WorkerStatus::new(3, 3, 0, Stage::Reporting))?;

    Ok(LassoOutput {
        fit: lasso_fit,
        ranking,
        report,
    })
}

/// Find where one channel crosses a threshold and for how long it stays above it
pub fn process_crossings(
    config: &Config,
    source: &dyn DataSource,
    tx: &Sender<WorkerStatus>,
) -> Result<(), ProcessorError> {
    let crossing_config = &config.crossings;
    let output_dir = config.get_output_directory()?;

    tx.send(WorkerStatus::new(0, 3, 0, Stage::Loading))?;
    let segments = resolve_segments(config, source)?;
    let series = fetch_segments(source, &crossing_config.channel, config.cadence, &segments)?;
    tx.send(WorkerStatus::new(1, 3, 0, Stage::Loading))?;

    let crossings = find_crossings(&series, crossing_config.threshold, crossing_config.direction);
    let above = segments_above(&series, crossing_config.threshold);
    log::info!(
        "{} crossed {} {} times ({} s at or above)",
        crossing_config.channel,
        crossing_config.threshold,
        crossings.len(),
        above.livetime()
    );
    tx.send(WorkerStatus::new(2, 3, 0, Stage::Fitting))?;

    write_text(
        &output_dir.join("crossings.txt"),
        &render_crossing_table(&crossing_config.channel, &crossings)?,
    )?;
    let mut writer = HDFWriter::new(&output_dir.join("crossings.h5"))?;
    writer.write_segments(
        &crossing_config.channel,
        &above,
        crossings.len() as u64,
        Some(crossing_config.threshold),
    )?;
    writer.close()?;

    let plot_dir = config.get_plot_directory()?;
    let plot = render(
        &CrossingFigure {
            name: &crossing_config.channel,
            t0: config.start as f64,
            times: series.times.view(),
            values: series.values.view(),
            threshold: crossing_config.threshold,
            crossings: crossings.iter().map(|c| (c.time, c.value)).collect(),
        },
        &plot_dir.join("crossings.png"),
    )?;

    let summary = run_summary(
        config,
        format!("Threshold crossings of {}", crossing_config.channel),
        &segments,
    );
    write_text(
        &output_dir.join(REPORT_NAME),
        &render_crossings_html(
            &summary,
            &crossing_config.channel,
            crossing_config.threshold,
            &crossings,
            &above,
            Some(plot.as_path()),
            &output_dir,
        )?,
    )?;
    tx.send(WorkerStatus::new(3, 3, 0, Stage::Reporting))?;
    Ok(())
}

/// Count overflow events on every requested overflow counter
pub fn process_overflow(
    config: &Config,
    source: &dyn DataSource,
    tx: &Sender<WorkerStatus>,
) -> Result<(), ProcessorError> {
    let output_dir = config.get_output_directory()?;
    let segments = resolve_segments(config, source)?;
    let channels = resolve_overflow_channels(config, source)?;
    let total = channels.len();

    let mut events = Vec::with_capacity(total);
    for (idx, channel) in channels.iter().enumerate() {
        // Trend averaging would blur single counter increments
        let series = fetch_segments(source, channel, Cadence::Raw, &segments)?;
        events.push(find_overflows(&series));
        tx.send(WorkerStatus::new(idx + 1, total, 0, Stage::Loading))?;
    }
    sort_overflows(&mut events);
    log::info!(
        "{} of {} channels overflowed",
        events.iter().filter(|e| e.has_overflows()).count(),
        total
    );

    write_text(&output_dir.join("overflows.txt"), &render_overflow_table(&events)?)?;
    let mut writer = HDFWriter::new(&output_dir.join("overflows.h5"))?;
    for event in events.iter() {
        writer.write_segments(&event.channel, &event.segments, event.n_overflows, None)?;
    }
    writer.close()?;

    let summary = run_summary(config, String::from("Overflow summary"), &segments);
    write_text(
        &output_dir.join(REPORT_NAME),
        &render_overflow_html(&summary, &events)?,
    )?;
    tx.send(WorkerStatus::new(1, 1, 0, Stage::Reporting))?;
    Ok(())
}

/// The function to be called by a separate thread (typically the CLI).
///
/// Opens the HDF5 archive named by the config and runs the requested analysis on it.
pub fn process(
    config: Config,
    analysis: Analysis,
    tx: Sender<WorkerStatus>,
) -> Result<(), ProcessorError> {
    config.validate()?;
    let source = Hdf5Source::open(&config.data_path)?;
    log::info!("Reading channel data from {}", source.path().display());
    match analysis {
        Analysis::Lasso => {
            let output = process_lasso(&config, &source, &tx)?;
            log::info!("Report written to {}", output.report.display());
        }
        Analysis::Crossings => process_crossings(&config, &source, &tx)?,
        Analysis::Overflow => process_overflow(&config, &source, &tx)?,
    }
    Ok(())
}
