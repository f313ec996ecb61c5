//! Experiment configuration.
//!
//! Loaded from TOML. The defaults reproduce the three reference strategy
//! variants: a Sharpe-optimized DTI filter, a tail-optimized DTI filter and
//! a joint DTI + rate-trend filter.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{PreparationSpec, TrendFeature};
use crate::walkforward::{ObjectiveKind, QuantileGrid, SignalRule};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Input and output locations plus the panel's column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Master panel CSV.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Directory for summary/timeseries/params artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_date_column")]
    pub date_column: String,

    /// Price level used for forward returns.
    #[serde(default = "default_price_column")]
    pub price_column: String,

    #[serde(default = "default_regime_column")]
    pub regime_column: String,

    /// Optional first date kept from the input.
    #[serde(default)]
    pub start: Option<NaiveDate>,

    /// Optional last date kept from the input.
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

fn default_input() -> PathBuf {
    PathBuf::from("outputs/path_a/master.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs/strategy_filter")
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_price_column() -> String {
    "real_price_index".to_string()
}

fn default_regime_column() -> String {
    "regime".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output_dir: default_output_dir(),
            date_column: default_date_column(),
            price_column: default_price_column(),
            regime_column: default_regime_column(),
            start: None,
            end: None,
        }
    }
}

/// One walk-forward strategy variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Name used in reports and output file names.
    pub name: String,

    /// Leading rows before the first decision.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Minimum eligible training rows before grid search is attempted.
    #[serde(default = "default_min_support")]
    pub min_support: usize,

    /// Regime class subject to filtering.
    #[serde(default)]
    pub eligible_regime: i64,

    #[serde(default)]
    pub objective: ObjectiveKind,

    /// Signal rules, searched jointly in this order.
    pub signals: Vec<SignalRule>,

    /// Trend features derived before the run.
    #[serde(default)]
    pub trends: Vec<TrendFeature>,

    /// Columns that must be present on every evaluated row.
    #[serde(default)]
    pub extra_required: Vec<String>,
}

fn default_window() -> usize {
    20
}

fn default_min_support() -> usize {
    10
}

fn dti_grid() -> QuantileGrid {
    QuantileGrid::range(0.60, 0.95, 0.05)
}

impl StrategyConfig {
    /// DTI filter, threshold chosen by training Sharpe.
    pub fn dti_sharpe() -> Self {
        Self {
            name: "dti_filter".to_string(),
            window: 20,
            min_support: 10,
            eligible_regime: 0,
            objective: ObjectiveKind::Sharpe,
            signals: vec![SignalRule::new("dti", dti_grid(), 0.8)],
            trends: vec![],
            extra_required: vec![],
        }
    }

    /// DTI filter, threshold chosen by training 5th percentile.
    pub fn dti_tail() -> Self {
        Self {
            name: "dti_filter_tail".to_string(),
            objective: ObjectiveKind::TailP05,
            ..Self::dti_sharpe()
        }
    }

    /// Joint DTI and 4-period real-rate change filter, tail objective.
    pub fn dti_rate_tail() -> Self {
        Self {
            name: "dti_dr4_filter".to_string(),
            window: 24,
            min_support: 12,
            eligible_regime: 0,
            objective: ObjectiveKind::JointTail,
            signals: vec![
                SignalRule::new("dti", dti_grid(), 0.8),
                SignalRule::new("dr4", QuantileGrid::range(0.50, 0.90, 0.10), 0.7),
            ],
            trends: vec![TrendFeature::new("dr4", "real_rate")],
            extra_required: vec!["real_rate".to_string()],
        }
    }

    pub fn signal_columns(&self) -> Vec<String> {
        self.signals.iter().map(|s| s.column.clone()).collect()
    }

    /// Preparation steps for this strategy on the given data layout.
    pub fn preparation(&self, data: &DataConfig, horizon: usize) -> PreparationSpec {
        PreparationSpec {
            price_column: data.price_column.clone(),
            regime_column: data.regime_column.clone(),
            forward_column: forward_column(horizon),
            horizon,
            signal_columns: self.signal_columns(),
            trends: self.trends.clone(),
            extra_required: self.extra_required.clone(),
        }
    }

    /// Check this strategy on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(format!("{}: {}", self.name, msg)));

        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy name must not be empty".to_string()));
        }
        if self.window == 0 {
            return invalid("window must be at least 1".to_string());
        }
        if self.signals.is_empty() {
            return invalid("at least one signal rule is required".to_string());
        }
        if self.signals.len() != self.objective.signal_count() {
            return invalid(format!(
                "objective {} searches {} signal(s), {} configured",
                self.objective.as_str(),
                self.objective.signal_count(),
                self.signals.len()
            ));
        }
        for rule in &self.signals {
            if rule.grid.is_empty() {
                return invalid(format!("quantile grid for {} is empty", rule.column));
            }
            if let Some(q) = rule.grid.levels().iter().find(|q| !(**q > 0.0 && **q < 1.0)) {
                return invalid(format!("quantile level {} for {} is outside (0, 1)", q, rule.column));
            }
            if !(0.0..=1.0).contains(&rule.fallback_quantile) {
                return invalid(format!(
                    "fallback quantile {} for {} is outside [0, 1]",
                    rule.fallback_quantile, rule.column
                ));
            }
        }
        Ok(())
    }
}

/// Name of the forward-return column for a horizon, e.g. `fwd_ret_4q`.
pub fn forward_column(horizon: usize) -> String {
    format!("fwd_ret_{}q", horizon)
}

/// Complete run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub data: DataConfig,

    /// Forward-return horizon in periods.
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    #[serde(default = "default_strategies", rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

fn default_horizon() -> usize {
    4
}

fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::dti_sharpe(),
        StrategyConfig::dti_tail(),
        StrategyConfig::dti_rate_tail(),
    ]
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            horizon: default_horizon(),
            strategies: default_strategies(),
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::Invalid("horizon must be at least 1".to_string()));
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid("no strategies configured".to_string()));
        }
        if let (Some(start), Some(end)) = (self.data.start, self.data.end) {
            if end < start {
                return Err(ConfigError::Invalid(format!(
                    "end date {} precedes start date {}",
                    end, start
                )));
            }
        }

        let mut names = HashSet::new();
        for strategy in &self.strategies {
            strategy.validate()?;
            if !names.insert(strategy.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate strategy name {}",
                    strategy.name
                )));
            }
        }
        Ok(())
    }
}
