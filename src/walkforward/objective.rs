//! Threshold selection objectives.
//!
//! Every objective maps a return series to one score, higher is better.
//! NaN entries are dropped before scoring.

use serde::{Deserialize, Serialize};

use crate::metrics::stats;

/// Objective scored on the training prefix for each candidate.
pub trait Objective: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score a return series. May be NaN for degenerate input.
    fn score(&self, returns: &[f64]) -> f64;
}

/// Mean over population standard deviation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharpeObjective;

impl Objective for SharpeObjective {
    fn name(&self) -> &'static str {
        "sharpe"
    }

    fn score(&self, returns: &[f64]) -> f64 {
        stats::sharpe(returns)
    }
}

/// A lower quantile of the return distribution.
#[derive(Debug, Clone, Copy)]
pub struct TailQuantileObjective {
    pub quantile: f64,
}

impl Default for TailQuantileObjective {
    fn default() -> Self {
        Self { quantile: 0.05 }
    }
}

impl Objective for TailQuantileObjective {
    fn name(&self) -> &'static str {
        "tail_quantile"
    }

    fn score(&self, returns: &[f64]) -> f64 {
        stats::quantile(returns, self.quantile)
    }
}

/// Objective selector as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    #[default]
    Sharpe,
    /// 5th percentile over a single-signal grid.
    TailP05,
    /// 5th percentile over the cross product of two signal grids.
    JointTail,
}

impl ObjectiveKind {
    pub fn build(&self) -> Box<dyn Objective> {
        match self {
            Self::Sharpe => Box::new(SharpeObjective),
            Self::TailP05 | Self::JointTail => Box::new(TailQuantileObjective::default()),
        }
    }

    /// Number of signal rules this objective searches over.
    pub fn signal_count(&self) -> usize {
        match self {
            Self::Sharpe | Self::TailP05 => 1,
            Self::JointTail => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::TailP05 => "tail_p05",
            Self::JointTail => "joint_tail",
        }
    }
}

/// Index and score of the best candidate, scanning in order.
///
/// The incumbent is only replaced on strict improvement, so the first
/// candidate wins ties. A NaN score falls back to the mean of the scored
/// series; a NaN mean ranks below every number.
pub fn select_best<T>(
    candidates: &[T],
    objective: &dyn Objective,
    mut returns_for: impl FnMut(&T) -> Vec<f64>,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (i, candidate) in candidates.iter().enumerate() {
        let returns = returns_for(candidate);
        let mut score = objective.score(&returns);
        if score.is_nan() {
            score = stats::mean(&returns);
        }
        if score.is_nan() {
            score = f64::NEG_INFINITY;
        }

        match best {
            Some((_, incumbent)) if score <= incumbent => {}
            _ => best = Some((i, score)),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_objective_kinds() {
        assert_eq!(ObjectiveKind::Sharpe.build().name(), "sharpe");
        assert_eq!(ObjectiveKind::JointTail.build().name(), "tail_quantile");
        assert_eq!(ObjectiveKind::JointTail.signal_count(), 2);
        assert_eq!(ObjectiveKind::TailP05.signal_count(), 1);
    }

    #[test]
    fn test_objective_kind_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            objective: ObjectiveKind,
        }
        let w: Wrapper = toml::from_str("objective = \"tail_p05\"").unwrap();
        assert_eq!(w.objective, ObjectiveKind::TailP05);
    }

    #[test]
    fn test_tail_objective_drops_nan() {
        let objective = TailQuantileObjective { quantile: 0.5 };
        assert_relative_eq!(objective.score(&[f64::NAN, 1.0, 3.0]), 2.0);
    }

    #[test]
    fn test_select_best_first_wins_ties() {
        let candidates = [0usize, 1, 2, 3];
        // candidates 1 and 2 share the best score
        let series = [vec![0.0, 1.0], vec![1.0, 3.0], vec![2.0, 6.0], vec![0.0, 2.0]];
        let (idx, score) =
            select_best(&candidates, &SharpeObjective, |&c| series[c].clone()).unwrap();
        assert_eq!(idx, 1);
        assert_relative_eq!(score, 2.0);
    }

    #[test]
    fn test_select_best_zero_std_falls_back_to_mean() {
        let candidates = [0usize, 1];
        // constant series have NaN Sharpe, scored by their means instead
        let series = [vec![0.0, 0.0], vec![0.5, 0.5]];
        let (idx, score) =
            select_best(&candidates, &SharpeObjective, |&c| series[c].clone()).unwrap();
        assert_eq!(idx, 1);
        assert_relative_eq!(score, 0.5);
    }

    #[test]
    fn test_select_best_empty() {
        let candidates: [usize; 0] = [];
        assert!(select_best(&candidates, &SharpeObjective, |_| vec![]).is_none());
    }
}
