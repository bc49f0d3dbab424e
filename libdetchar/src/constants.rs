/// Version of the layout written to the HDF5 result files
pub const FORMAT_VERSION: &str = "1.0";

/// A cubic needs four points to be determined
pub const MIN_SPLINE_KNOTS: usize = 4;

// Lasso solver defaults
pub const DEFAULT_MAX_ITER: usize = 1000;
pub const DEFAULT_TOLERANCE: f64 = 1.0e-4;
pub const DEFAULT_N_ALPHAS: usize = 100;
pub const DEFAULT_N_FOLDS: usize = 5;
/// Ratio of the smallest to the largest alpha on the cross-validation grid
pub const ALPHA_GRID_EPS: f64 = 1.0e-3;

// Severity bucket boundaries on |coefficient|
pub const HIGH_SEVERITY: f64 = 0.5;
pub const MEDIUM_SEVERITY: f64 = 0.2;

/// Default minimum |coefficient| for a channel to be considered useful
pub const DEFAULT_THRESHOLD: f64 = 1.0e-4;

// Seconds between the unix epoch and the GPS epoch (1980-01-06T00:00:00Z)
pub const GPS_EPOCH_UNIX: i64 = 315_964_800;

pub const PLOTS_DIR: &str = "plots";
pub const REPORT_NAME: &str = "index.html";
