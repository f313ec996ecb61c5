//! Candidate threshold construction.
//!
//! Candidates come from empirical quantiles of each signal over the
//! eligible rows of the training prefix only. When the prefix has too few
//! eligible rows, a fixed quantile of the full training signal is used
//! instead of a grid search.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::stats::{quantile, quantile_sorted};

use super::observation::Observation;

/// Tolerance when counting grid steps between `start` and `stop`.
const STEP_EPSILON: f64 = 1e-9;

/// Ordered quantile levels in (0, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GridSpec", into = "GridSpec")]
pub struct QuantileGrid {
    levels: Vec<f64>,
}

/// Serialized form: an explicit list or an inclusive range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GridSpec {
    Levels(Vec<f64>),
    Range { start: f64, stop: f64, step: f64 },
}

impl From<GridSpec> for QuantileGrid {
    fn from(spec: GridSpec) -> Self {
        match spec {
            GridSpec::Levels(levels) => Self::new(levels),
            GridSpec::Range { start, stop, step } => Self::range(start, stop, step),
        }
    }
}

impl From<QuantileGrid> for GridSpec {
    fn from(grid: QuantileGrid) -> Self {
        GridSpec::Levels(grid.levels)
    }
}

impl QuantileGrid {
    pub fn new(levels: Vec<f64>) -> Self {
        Self { levels }
    }

    /// Levels `start, start + step, ...` up to and including `stop`.
    ///
    /// Each level is computed as `start + i * step`, so 0.60..=0.95 by 0.05
    /// yields 8 levels and 0.50..=0.90 by 0.10 yields 5.
    pub fn range(start: f64, stop: f64, step: f64) -> Self {
        if step <= 0.0 || stop < start {
            return Self::new(vec![]);
        }
        let count = ((stop - start) / step + STEP_EPSILON).floor() as usize + 1;
        Self::new((0..count).map(|i| start + i as f64 * step).collect())
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

fn default_fallback_quantile() -> f64 {
    0.8
}

/// One signal's threshold search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRule {
    /// Signal column name.
    pub column: String,
    /// Quantile levels searched on eligible training rows.
    pub grid: QuantileGrid,
    /// Quantile of the full training signal used when support is thin.
    #[serde(default = "default_fallback_quantile")]
    pub fallback_quantile: f64,
}

impl SignalRule {
    pub fn new(column: &str, grid: QuantileGrid, fallback_quantile: f64) -> Self {
        Self {
            column: column.to_string(),
            grid,
            fallback_quantile,
        }
    }
}

/// Thresholds available to one walk-forward step.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSet {
    /// Threshold tuples to score, in grid order.
    GridSearch(Vec<Vec<f64>>),
    /// Too few eligible rows; use these thresholds directly.
    Fallback(Vec<f64>),
}

impl CandidateSet {
    /// Build the candidates for a training prefix.
    pub fn build(
        train: &[Observation],
        rules: &[SignalRule],
        eligible_regime: i64,
        min_support: usize,
    ) -> Self {
        let eligible: Vec<&Observation> = train
            .iter()
            .filter(|o| o.regime == eligible_regime && o.signals.iter().all(|s| s.is_some()))
            .collect();

        if eligible.len() < min_support {
            debug!(
                "{} eligible rows < min support {}, using fallback quantiles",
                eligible.len(),
                min_support
            );
            let thresholds = rules
                .iter()
                .enumerate()
                .map(|(i, rule)| {
                    let all: Vec<f64> = train.iter().filter_map(|o| o.signals[i]).collect();
                    quantile(&all, rule.fallback_quantile)
                })
                .collect();
            return Self::Fallback(thresholds);
        }

        let axes: Vec<Vec<f64>> = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let mut values: Vec<f64> = eligible.iter().filter_map(|o| o.signals[i]).collect();
                values.sort_by(f64::total_cmp);
                rule.grid
                    .levels()
                    .iter()
                    .map(|&q| quantile_sorted(&values, q))
                    .collect()
            })
            .collect();

        Self::GridSearch(cross_product(&axes))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Lexicographic cross product; the first axis varies slowest.
fn cross_product(axes: &[Vec<f64>]) -> Vec<Vec<f64>> {
    axes.iter().fold(vec![Vec::new()], |acc, axis| {
        acc.iter()
            .flat_map(|prefix| {
                axis.iter().map(move |v| {
                    let mut tuple = prefix.clone();
                    tuple.push(*v);
                    tuple
                })
            })
            .collect()
    })
}
