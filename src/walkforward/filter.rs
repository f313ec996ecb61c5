//! Exit predicate for threshold filters.
//!
//! A row exits when it belongs to the filtered regime and every signal is
//! strictly above its threshold. Exited rows earn exactly zero; held rows
//! earn the raw forward return. A missing signal or a NaN threshold never
//! triggers an exit.

use super::observation::Observation;

/// Threshold filter over one or more signals.
#[derive(Debug, Clone, Copy)]
pub struct FilterRule<'a> {
    thresholds: &'a [f64],
    eligible_regime: i64,
}

impl<'a> FilterRule<'a> {
    pub fn new(thresholds: &'a [f64], eligible_regime: i64) -> Self {
        Self {
            thresholds,
            eligible_regime,
        }
    }

    /// Whether the rule exits this row.
    pub fn exits(&self, row: &Observation) -> bool {
        row.regime == self.eligible_regime
            && row
                .signals
                .iter()
                .zip(self.thresholds)
                .all(|(signal, threshold)| signal.is_some_and(|v| v > *threshold))
    }

    /// Return realized on one row under the rule.
    pub fn realized(&self, row: &Observation) -> f64 {
        if self.exits(row) {
            0.0
        } else {
            row.forward_return
        }
    }

    /// Returns realized over a slice of rows.
    pub fn apply(&self, rows: &[Observation]) -> Vec<f64> {
        rows.iter().map(|r| self.realized(r)).collect()
    }
}
