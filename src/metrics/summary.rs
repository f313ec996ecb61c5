//! Return-distribution summaries for evaluation frames.

use serde::Serialize;

use crate::walkforward::EvaluationFrame;

use super::stats;

/// Distribution statistics of one return series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub name: String,
    pub n: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    /// NaN when `std` is zero.
    pub sharpe: f64,
    pub min: f64,
    pub p05: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
}

impl SummaryStats {
    pub fn from_returns(name: &str, returns: &[f64]) -> Self {
        let mut sorted = stats::present(returns);
        sorted.sort_by(f64::total_cmp);

        Self {
            name: name.to_string(),
            n: sorted.len(),
            mean: stats::mean(&sorted),
            std: stats::population_std(&sorted),
            sharpe: stats::sharpe(&sorted),
            min: stats::quantile_sorted(&sorted, 0.0),
            p05: stats::quantile_sorted(&sorted, 0.05),
            p50: stats::quantile_sorted(&sorted, 0.50),
            p95: stats::quantile_sorted(&sorted, 0.95),
            max: stats::quantile_sorted(&sorted, 1.0),
        }
    }
}

/// Share of steps where the filtered regime held and the strategy earned
/// exactly zero. NaN for an empty frame.
pub fn filtered_frequency(frame: &EvaluationFrame) -> f64 {
    if frame.is_empty() {
        return f64::NAN;
    }
    let filtered = frame
        .records
        .iter()
        .filter(|r| r.regime == frame.eligible_regime && r.strategy_ret == 0.0)
        .count();
    filtered as f64 / frame.len() as f64
}

/// Baseline versus strategy comparison for one run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub strategy: String,
    pub decisions: usize,
    pub baseline: SummaryStats,
    pub strategy_stats: SummaryStats,
    /// Intervention diagnostic, not a performance metric.
    pub filtered_frequency: f64,
    pub fallback_steps: usize,
}

impl EvaluationReport {
    pub fn from_frame(frame: &EvaluationFrame) -> Self {
        Self {
            strategy: frame.strategy.clone(),
            decisions: frame.len(),
            baseline: SummaryStats::from_returns("baseline", &frame.baseline_returns()),
            strategy_stats: SummaryStats::from_returns(&frame.strategy, &frame.strategy_returns()),
            filtered_frequency: filtered_frequency(frame),
            fallback_steps: frame.fallback_steps(),
        }
    }

    /// Summary rows in output order.
    pub fn rows(&self) -> [&SummaryStats; 2] {
        [&self.baseline, &self.strategy_stats]
    }

    pub fn summary(&self) -> String {
        format!(
            "Strategy Summary: {}\n\
             ====================\n\
             \n\
             Decisions: {} ({} fallback)\n\
             \n\
             Baseline Mean: {:.4}  Std: {:.4}  Sharpe: {:.2}\n\
             Baseline P05: {:.4}  Min: {:.4}\n\
             Strategy Mean: {:.4}  Std: {:.4}  Sharpe: {:.2}\n\
             Strategy P05: {:.4}  Min: {:.4}\n\
             \n\
             Filtered Frequency: {:.1}%",
            self.strategy,
            self.decisions,
            self.fallback_steps,
            self.baseline.mean,
            self.baseline.std,
            self.baseline.sharpe,
            self.baseline.p05,
            self.baseline.min,
            self.strategy_stats.mean,
            self.strategy_stats.std,
            self.strategy_stats.sharpe,
            self.strategy_stats.p05,
            self.strategy_stats.min,
            self.filtered_frequency * 100.0
        )
    }
}
