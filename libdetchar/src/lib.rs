//! # detchar
//!
//! detchar is a set of detector characterization tools for gravitational-wave
//! observatories, written in Rust. Given a span of GPS time it reads channel data from an
//! HDF5 archive and
//!
//! - ranks auxiliary channels by how well a sparse linear (lasso) model built from them
//! explains a reference channel, typically the sensitivity range,
//! - finds the threshold crossings of a single channel,
//! - counts digital overflow events on cumulative overflow counters.
//!
//! Each analysis writes a plain-text table, an HDF5 result file, plots, and an HTML
//! summary page to the output directory.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### HDF5
//!
//! Before building and running detchar, HDF5 must be installed. Typically this will be
//! installed using a package manager (homebrew, apt, etc), and the Rust libraries will
//! auto detect the location of the HDF install. If HDF5 is installed to a custom location,
//! write the following snippet into the file `.cargo/config.toml` in the repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./detchar_cli` from the top
//! level repository. To use the CLI see the `detchar_cli` README.
//!
//! ## Configuration
//!
//! A template configuration can be generated with `detchar_cli -p config.yml new`. The
//! YAML format of a configuration file is as follows:
//!
//! ```yml
//! data_path: /data/archive.h5
//! output_path: /data/results/
//! start: 1126259462
//! end: 1126263062
//! state_flag: X1:DMT-ANALYSIS_READY:1
//! cadence: MinuteTrend
//! n_threads: 4
//! lasso:
//!   reference_channel: X1:DMT-SNSH_EFFECTIVE_RANGE_MPC
//!   channels: []
//!   channel_file: channels.txt
//!   channel_pattern: null
//!   outlier_sigma: 3.0
//!   alpha: null
//!   n_folds: 5
//!   threshold: 0.0001
//! crossings:
//!   channel: X1:ISI-GND_STS_ITMY_Z_BLRMS_30M_100M
//!   threshold: 400.0
//!   direction: Both
//! overflow:
//!   channels: []
//!   channel_pattern: X1:FEC-*_ADC_OVERFLOW_ACC_*
//! ```
//!
//! - `start`/`end`: GPS seconds; the analyzed span is `[start, end)`.
//! - `state_flag` (optional): only the segments where this flag was active are analyzed.
//! - `cadence`: `Raw`, `SecondTrend` or `MinuteTrend` (the default).
//! - `n_threads`: the number of plotting workers. Must be at least 1.
//! - `lasso.alpha`: a fixed penalty, or `null` to choose one by `n_folds`-fold
//! cross-validation.
//! - `lasso.outlier_sigma`: if set, reference samples further than this many standard
//! deviations from the mean are iteratively replaced with a cubic spline interpolation.
//! - `lasso.threshold`: channels with |coefficient| at or above this are plotted and listed
//! as significant.
//!
//! ## Input
//!
//! The archive named by `data_path` is laid out as
//!
//! ```text
//! archive.h5
//! channels
//! |---- <channel name>(dset) - t0, sample_rate
//! segments
//! |---- <flag name>(dset, N x 2)
//! ```
//!
//! ## Output
//!
//! ```text
//! lasso.h5
//! lasso - reference, start, end, alpha, mode, r_squared, threshold, version
//! |---- channels(dset), coefficients(dset)
//! |---- times(dset), reference(dset), prediction(dset)
//! |---- flat_channels(dset), useful_channels(dset)
//! |---- cross_validation - n_folds
//! |    |---- alphas(dset), mean_mse(dset)
//!
//! crossings.h5 / overflows.h5
//! <channel name> - count, threshold, version
//! |---- segments(dset, N x 2)
//! ```
//!
//! A log file `detchar.log` is written to the output directory by the CLI.
pub mod config;
pub mod constants;
pub mod crossings;
pub mod data_source;
pub mod error;
pub mod features;
pub mod gps;
pub mod hdf_writer;
pub mod lasso;
pub mod loader;
pub mod outlier;
pub mod overflow;
pub mod plots;
pub mod process;
pub mod ranking;
pub mod report;
pub mod segments;
pub mod spline;
pub mod time_series;
pub mod worker_status;
