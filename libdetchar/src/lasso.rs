//! L1-penalized least squares (the lasso), solved with linfa's elastic net.
//!
//! The objective is `(1/2n)|y - Xw|^2 + alpha * |w|_1` without an intercept.
//!
//! The engine does not rescale its inputs. Columns of X and y must already be normalized
//! to zero mean and unit variance (see [`crate::features`]); coefficients are comparable
//! across channels only because of that normalization.

use linfa::prelude::{Dataset, DatasetBase, Fit, Predict};
use linfa_elasticnet::{ElasticNet, ElasticNetError};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis, Ix1};

use super::constants::{
    ALPHA_GRID_EPS, DEFAULT_MAX_ITER, DEFAULT_N_ALPHAS, DEFAULT_N_FOLDS, DEFAULT_TOLERANCE,
};
use super::error::{ConfigurationError, DataError, Mismatch, ProcessorError};
use super::features::ChannelMatrix;

/// How the penalty strength is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Penalty {
    /// Use the given alpha
    Fixed(f64),
    /// Choose alpha by k-fold cross-validation over a log-spaced grid
    CrossValidated { n_folds: usize, n_alphas: usize },
}

impl Default for Penalty {
    fn default() -> Self {
        Self::CrossValidated {
            n_folds: DEFAULT_N_FOLDS,
            n_alphas: DEFAULT_N_ALPHAS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LassoSettings {
    pub penalty: Penalty,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LassoSettings {
    fn default() -> Self {
        Self {
            penalty: Penalty::default(),
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOLERANCE,
        }
    }
}

impl LassoSettings {
    /// Fixed penalty if an alpha is given, cross-validated otherwise
    pub fn from_alpha(alpha: Option<f64>, n_folds: usize) -> Self {
        let penalty = match alpha {
            Some(a) => Penalty::Fixed(a),
            None => Penalty::CrossValidated {
                n_folds,
                n_alphas: DEFAULT_N_ALPHAS,
            },
        };
        Self {
            penalty,
            ..Default::default()
        }
    }
}

/// Diagnostics of the alpha search
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidation {
    pub n_folds: usize,
    /// The alpha grid, largest first
    pub alphas: Vec<f64>,
    /// Mean out-of-fold mean squared error for each alpha
    pub mean_mse: Vec<f64>,
}

/// How the alpha of a fit was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum FitMode {
    Fixed,
    CrossValidated(CrossValidation),
}

impl FitMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::CrossValidated(_) => "cross-validated",
        }
    }
}

/// Channel coefficients and the penalty that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// One entry per ChannelMatrix column, in column order
    pub coefficients: Vec<(String, f64)>,
    pub alpha: f64,
    pub mode: FitMode,
}

impl FitResult {
    pub fn coefficient(&self, channel: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, c)| *c)
    }

    /// Number of channels with a non-zero coefficient
    pub fn n_selected(&self) -> usize {
        self.coefficients.iter().filter(|(_, c)| *c != 0.0).count()
    }
}

#[derive(Debug, Clone)]
pub struct LassoFit {
    pub result: FitResult,
    /// The model prediction for each sample
    pub prediction: Array1<f64>,
    pub r_squared: f64,
    pub converged: bool,
}

/// Fit the lasso at one alpha
fn lasso_model(
    dataset: &Dataset<f64, f64, Ix1>,
    alpha: f64,
    settings: &LassoSettings,
) -> Result<ElasticNet<f64>, ElasticNetError> {
    ElasticNet::<f64>::params()
        .penalty(alpha)
        .l1_ratio(1.0)
        .with_intercept(false)
        .max_iterations(settings.max_iter as u32)
        .tolerance(settings.tol)
        .fit(dataset)
}

/// Solve the lasso at a fixed alpha.
///
/// Returns the coefficients and whether the solver met its tolerance within
/// `settings.max_iter` sweeps.
pub fn solve(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
    settings: &LassoSettings,
) -> Result<(Array1<f64>, bool), ElasticNetError> {
    let dataset = DatasetBase::new(x.to_owned(), y.to_owned());
    let model = lasso_model(&dataset, alpha, settings)?;
    let converged = (model.n_steps() as usize) < settings.max_iter;
    Ok((model.hyperplane().to_owned(), converged))
}

/// Smallest alpha for which every coefficient is zero
pub fn alpha_max(x: ArrayView2<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.nrows() as f64;
    x.axis_iter(Axis(1))
        .map(|col| (col.dot(&y) / n).abs())
        .fold(0.0, f64::max)
}

/// A log-spaced grid from alpha_max down to alpha_max * ALPHA_GRID_EPS
pub fn alpha_grid(alpha_max: f64, n_alphas: usize) -> Vec<f64> {
    if alpha_max <= 0.0 || n_alphas == 0 {
        return vec![0.0];
    }
    if n_alphas == 1 {
        return vec![alpha_max];
    }
    (0..n_alphas)
        .map(|i| alpha_max * ALPHA_GRID_EPS.powf(i as f64 / (n_alphas - 1) as f64))
        .collect()
}

fn mean_squared_error(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let diff = &a - &b;
    diff.dot(&diff) / a.len() as f64
}

fn r_squared(y: ArrayView1<f64>, prediction: ArrayView1<f64>) -> f64 {
    let mean = y.mean().unwrap_or(0.0);
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let diff = &y - &prediction;
    let ss_res = diff.dot(&diff);
    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Run k-fold cross-validation over an alpha grid.
///
/// Folds are contiguous blocks of samples. When the samples do not divide evenly the
/// remainder is only ever used for training.
fn cross_validate(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    n_folds: usize,
    n_alphas: usize,
    settings: &LassoSettings,
) -> Result<CrossValidation, ProcessorError> {
    let n_samples = x.nrows();
    if n_folds < 2 || n_folds > n_samples {
        return Err(ConfigurationError::InvalidFolds(n_folds, n_samples).into());
    }
    let alphas = alpha_grid(alpha_max(x, y), n_alphas);
    let mut total_mse = vec![0.0; alphas.len()];

    let dataset = DatasetBase::new(x.to_owned(), y.to_owned());
    for (train, valid) in dataset.fold(n_folds).iter() {
        for (idx, alpha) in alphas.iter().enumerate() {
            let model = lasso_model(train, *alpha, settings)?;
            let prediction: Array1<f64> = model.predict(valid.records());
            total_mse[idx] += mean_squared_error(valid.targets().view(), prediction.view());
        }
    }

    Ok(CrossValidation {
        n_folds,
        alphas,
        mean_mse: total_mse.into_iter().map(|t| t / n_folds as f64).collect(),
    })
}

/// Fit the lasso of the reference vector `y` on the channel matrix.
pub fn fit(
    matrix: &ChannelMatrix,
    y: ArrayView1<f64>,
    settings: &LassoSettings,
) -> Result<LassoFit, ProcessorError> {
    if matrix.ncols() == 0 {
        return Err(ConfigurationError::NoActiveChannels.into());
    }
    if matrix.nrows() != y.len() {
        return Err(DataError::Misaligned {
            channel: String::from("reference"),
            mismatch: Mismatch::Length {
                expected: matrix.nrows(),
                found: y.len(),
            },
        }
        .into());
    }
    let x = matrix.data.view();

    let (alpha, mode) = match settings.penalty {
        Penalty::Fixed(alpha) => (alpha, FitMode::Fixed),
        Penalty::CrossValidated { n_folds, n_alphas } => {
            let cv = cross_validate(x, y, n_folds, n_alphas, settings)?;
            let best = cv
                .mean_mse
                .iter()
                .enumerate()
                .fold(0, |best, (idx, mse)| if *mse < cv.mean_mse[best] { idx } else { best });
            let alpha = cv.alphas[best];
            log::info!(
                "Cross-validation over {} folds selected alpha = {alpha:.3e} (mean MSE {:.4})",
                n_folds,
                cv.mean_mse[best]
            );
            (alpha, FitMode::CrossValidated(cv))
        }
    };

    let (coef, converged) = solve(x, y, alpha, settings)?;
    if !converged {
        log::warn!(
            "Lasso did not converge within {} iterations at alpha = {alpha:.3e}",
            settings.max_iter
        );
    }
    let prediction = x.dot(&coef);
    let r_squared = r_squared(y, prediction.view());

    let result = FitResult {
        coefficients: matrix
            .names
            .iter()
            .cloned()
            .zip(coef.iter().copied())
            .collect(),
        alpha,
        mode,
    };

    Ok(LassoFit {
        result,
        prediction,
        r_squared,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::normalize;
    use ndarray::Array2;

    /// Three normalized channels where y depends on the first two only
    fn planted() -> (ChannelMatrix, Array1<f64>) {
        let n = 200;
        let a = Array1::from_shape_fn(n, |i| (i as f64 * 0.31).sin());
        let b = Array1::from_shape_fn(n, |i| (i as f64 * 0.17).cos());
        let c = Array1::from_shape_fn(n, |i| ((i * 7919) % 101) as f64);
        let cols: Vec<Array1<f64>> = [&a, &b, &c]
            .iter()
            .map(|col| normalize(col.view()).unwrap())
            .collect();
        let data = Array2::from_shape_fn((n, 3), |(row, col)| cols[col][row]);
        let raw_y = &cols[0] * 2.0 - &cols[1] * 0.5;
        let y = normalize(raw_y.view()).unwrap();
        let matrix = ChannelMatrix {
            names: vec!["X1:A".into(), "X1:B".into(), "X1:C".into()],
            order: vec![0, 1, 2],
            data,
        };
        (matrix, y)
    }

    #[test]
    fn test_fixed_alpha_recovers_sparse_model() {
        let (matrix, y) = planted();
        let settings = LassoSettings::from_alpha(Some(0.01), DEFAULT_N_FOLDS);
        let fit = fit(&matrix, y.view(), &settings).unwrap();
        assert!(fit.converged);
        assert_eq!(fit.result.mode, FitMode::Fixed);
        let a = fit.result.coefficient("X1:A").unwrap();
        let b = fit.result.coefficient("X1:B").unwrap();
        let c = fit.result.coefficient("X1:C").unwrap();
        assert!(a > 0.8, "a = {a}");
        assert!(b < -0.1, "b = {b}");
        assert!(c.abs() < 0.05, "c = {c}");
        assert!(fit.r_squared > 0.95);
        assert_eq!(fit.prediction.len(), y.len());
    }

    #[test]
    fn test_large_alpha_zeroes_everything() {
        let (matrix, y) = planted();
        let alpha = alpha_max(matrix.data.view(), y.view());
        let settings = LassoSettings::from_alpha(Some(alpha * 1.01), DEFAULT_N_FOLDS);
        let fit = fit(&matrix, y.view(), &settings).unwrap();
        assert_eq!(fit.result.n_selected(), 0);
        assert!(fit.prediction.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_cross_validated() {
        let (matrix, y) = planted();
        let settings = LassoSettings::from_alpha(None, 5);
        let fit = fit(&matrix, y.view(), &settings).unwrap();
        match &fit.result.mode {
            FitMode::CrossValidated(cv) => {
                assert_eq!(cv.alphas.len(), DEFAULT_N_ALPHAS);
                assert_eq!(cv.mean_mse.len(), DEFAULT_N_ALPHAS);
                assert!(cv.alphas.contains(&fit.result.alpha));
                assert!(cv.alphas.windows(2).all(|w| w[0] > w[1]));
            }
            FitMode::Fixed => panic!("expected cross-validated fit"),
        }
        assert!(fit.result.coefficient("X1:A").unwrap() > 0.5);
    }

    #[test]
    fn test_invalid_folds() {
        let (matrix, y) = planted();
        let settings = LassoSettings::from_alpha(None, 1);
        assert!(matches!(
            fit(&matrix, y.view(), &settings),
            Err(ProcessorError::ConfigurationError(ConfigurationError::InvalidFolds(1, 200)))
        ));
    }

    #[test]
    fn test_alpha_grid() {
        let grid = alpha_grid(2.0, 3);
        assert_eq!(grid.len(), 3);
        assert!((grid[0] - 2.0).abs() < 1e-12);
        assert!((grid[2] - 2.0e-3).abs() < 1e-12);
        assert_eq!(alpha_grid(0.0, 10), vec![0.0]);
    }
}
