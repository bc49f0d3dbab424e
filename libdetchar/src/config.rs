use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{DEFAULT_N_FOLDS, DEFAULT_THRESHOLD, PLOTS_DIR};
use super::error::ConfigError;

/// The rate at which channel data is read.
///
/// Trend data is pre-averaged and is the usual choice for spans of hours or days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cadence {
    Raw,
    SecondTrend,
    #[default]
    MinuteTrend,
}

impl Cadence {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::SecondTrend => ".mean,s-trend",
            Self::MinuteTrend => ".mean,m-trend",
        }
    }

    /// The name of the data product for a channel at this cadence
    pub fn channel_name(&self, channel: &str) -> String {
        format!("{channel}{}", self.suffix())
    }

    /// The channel a data product belongs to, if the product is at this cadence
    pub fn base_name<'a>(&self, product: &'a str) -> Option<&'a str> {
        match self {
            Self::Raw => (!product.ends_with("-trend")).then_some(product),
            _ => product.strip_suffix(self.suffix()),
        }
    }
}

/// Which threshold crossings to report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Rising,
    Falling,
    #[default]
    Both,
}

/// Settings for the lasso correlation between a reference channel and auxiliary channels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoConfig {
    pub reference_channel: String,
    pub channels: Vec<String>,
    pub channel_file: Option<PathBuf>,
    pub channel_pattern: Option<String>,
    pub outlier_sigma: Option<f64>,
    pub alpha: Option<f64>,
    pub n_folds: usize,
    pub threshold: f64,
}

impl Default for LassoConfig {
    fn default() -> Self {
        Self {
            reference_channel: String::from(""),
            channels: vec![],
            channel_file: None,
            channel_pattern: None,
            outlier_sigma: None,
            alpha: None,
            n_folds: DEFAULT_N_FOLDS,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Settings for finding the threshold crossings of a single channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossingConfig {
    pub channel: String,
    pub threshold: f64,
    pub direction: Direction,
}

/// Settings for scanning cumulative overflow counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverflowConfig {
    pub channels: Vec<String>,
    pub channel_pattern: Option<String>,
}

/// Structure representing the application configuration. Contains pathing and span information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub start: i64,
    pub end: i64,
    pub state_flag: Option<String>,
    #[serde(default)]
    pub cadence: Cadence,
    pub n_threads: i32,
    #[serde(default)]
    pub lasso: LassoConfig,
    #[serde(default)]
    pub crossings: CrossingConfig,
    #[serde(default)]
    pub overflow: OverflowConfig,
}

impl Default for Config {
    /// Generate a new Config object. All fields will be empty/invalid
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            start: 0,
            end: 0,
            state_flag: None,
            cadence: Cadence::default(),
            n_threads: 1,
            lasso: LassoConfig::default(),
            crossings: CrossingConfig::default(),
            overflow: OverflowConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check the values which cannot be checked by the type system
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end <= self.start {
            return Err(ConfigError::InvalidSpan(self.start, self.end));
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::InvalidThreads(self.n_threads));
        }
        let lasso = &self.lasso;
        if !(lasso.threshold >= 0.0 && lasso.threshold.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "lasso.threshold",
                value: lasso.threshold,
            });
        }
        if let Some(sigma) = lasso.outlier_sigma {
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err(ConfigError::InvalidValue {
                    field: "lasso.outlier_sigma",
                    value: sigma,
                });
            }
        }
        if let Some(alpha) = lasso.alpha {
            if !(alpha >= 0.0 && alpha.is_finite()) {
                return Err(ConfigError::InvalidValue {
                    field: "lasso.alpha",
                    value: alpha,
                });
            }
        }
        if !self.crossings.threshold.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "crossings.threshold",
                value: self.crossings.threshold,
            });
        }
        Ok(())
    }

    /// Read the auxiliary channel list file, if there is one.
    ///
    /// One channel per line; blank lines and lines starting with # are skipped.
    pub fn read_channel_file(&self) -> Result<Vec<String>, ConfigError> {
        let path = match &self.lasso.channel_file {
            Some(p) => p,
            None => return Ok(vec![]),
        };
        if !path.exists() {
            return Err(ConfigError::BadFilePath(path.clone()));
        }
        Ok(parse_channel_list(&std::fs::read_to_string(path)?))
    }

    /// Get the output directory, creating it if needed
    pub fn get_output_directory(&self) -> Result<PathBuf, ConfigError> {
        std::fs::create_dir_all(&self.output_path)?;
        Ok(self.output_path.clone())
    }

    /// Get the plot directory inside the output directory, creating it if needed
    pub fn get_plot_directory(&self) -> Result<PathBuf, ConfigError> {
        let plot_dir = self.output_path.join(PLOTS_DIR);
        std::fs::create_dir_all(&plot_dir)?;
        Ok(plot_dir)
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}

/// Parse a channel list, one per line, skipping blanks and # comments
pub fn parse_channel_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
