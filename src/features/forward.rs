//! Forward returns, trend features and panel preparation.
//!
//! All shifts use one explicit horizon `H`. The features are computed once
//! over the whole sorted panel, so training rows and test rows see exactly
//! the same definitions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Panel, PanelError};

/// A trend feature `name[t] = source[t] - source[t - H]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFeature {
    pub name: String,
    pub source: String,
}

impl TrendFeature {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
        }
    }
}

/// Everything needed to turn a raw panel into walk-forward input.
#[derive(Debug, Clone)]
pub struct PreparationSpec {
    pub price_column: String,
    pub regime_column: String,
    /// Name of the appended forward-return column.
    pub forward_column: String,
    pub horizon: usize,
    /// Signals the strategy reads (may include trend outputs).
    pub signal_columns: Vec<String>,
    pub trends: Vec<TrendFeature>,
    /// Additional columns that must be present on every kept row.
    pub extra_required: Vec<String>,
}

impl PreparationSpec {
    /// Columns that must exist in the input panel.
    pub fn input_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.price_column.as_str(), self.regime_column.as_str()];
        for trend in &self.trends {
            cols.push(trend.source.as_str());
        }
        for signal in &self.signal_columns {
            if !self.trends.iter().any(|t| &t.name == signal) {
                cols.push(signal.as_str());
            }
        }
        cols.extend(self.extra_required.iter().map(|c| c.as_str()));
        dedup(cols)
    }

    /// Columns that must be present on every row that reaches the engine.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.forward_column.as_str(), self.regime_column.as_str()];
        cols.extend(self.signal_columns.iter().map(|c| c.as_str()));
        cols.extend(self.trends.iter().map(|t| t.source.as_str()));
        cols.extend(self.trends.iter().map(|t| t.name.as_str()));
        cols.extend(self.extra_required.iter().map(|c| c.as_str()));
        dedup(cols)
    }
}

fn dedup(cols: Vec<&str>) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(cols.len());
    for c in cols {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// `log(p[t + h]) - log(p[t])`; `None` past the end or for non-positive prices.
pub fn forward_log_return(prices: &[Option<f64>], horizon: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|t| {
            let now = prices[t]?;
            let later = (*prices.get(t + horizon)?)?;
            if now <= 0.0 || later <= 0.0 {
                return None;
            }
            Some(later.ln() - now.ln())
        })
        .collect()
}

/// `x[t] - x[t - h]`; `None` for the first `h` rows.
pub fn lagged_change(values: &[Option<f64>], horizon: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            let past = t.checked_sub(horizon)?;
            Some(values[t]? - values[past]?)
        })
        .collect()
}

/// Sort, derive forward return and trends, then drop incomplete rows.
pub fn prepare_panel(panel: &Panel, spec: &PreparationSpec) -> Result<Panel, PanelError> {
    panel.require(&spec.input_columns())?;

    let mut prepared = panel.sorted_by_date();

    let fwd = forward_log_return(prepared.column(&spec.price_column)?, spec.horizon);
    prepared.insert_column(&spec.forward_column, fwd)?;

    for trend in &spec.trends {
        let change = lagged_change(prepared.column(&trend.source)?, spec.horizon);
        prepared.insert_column(&trend.name, change)?;
    }

    let cleaned = prepared.drop_missing(&spec.required_columns())?;
    debug!(
        "Prepared panel: {} rows in, {} rows after dropping incomplete rows",
        panel.len(),
        cleaned.len()
    );

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn quarters(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Months::new(3 * i as u32))
            .collect()
    }

    fn spec(trends: Vec<TrendFeature>, signals: &[&str]) -> PreparationSpec {
        PreparationSpec {
            price_column: "real_price_index".to_string(),
            regime_column: "regime".to_string(),
            forward_column: "fwd_ret_4q".to_string(),
            horizon: 4,
            signal_columns: signals.iter().map(|s| s.to_string()).collect(),
            trends,
            extra_required: vec![],
        }
    }

    #[test]
    fn test_forward_log_return_tail_undefined() {
        let prices: Vec<Option<f64>> = (1..=6).map(|p| Some(p as f64)).collect();
        let fwd = forward_log_return(&prices, 4);

        assert_relative_eq!(fwd[0].unwrap(), 5.0_f64.ln());
        assert_relative_eq!(fwd[1].unwrap(), 3.0_f64.ln());
        assert!(fwd[2..].iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_forward_log_return_skips_missing_price() {
        let prices = vec![Some(100.0), None, Some(110.0), Some(0.0)];
        let fwd = forward_log_return(&prices, 1);
        assert_eq!(fwd[0], None);
        assert_eq!(fwd[1], None);
        assert_eq!(fwd[2], None);
    }

    #[test]
    fn test_lagged_change_head_undefined() {
        let rates = vec![Some(1.0), Some(1.5), Some(2.5), Some(2.0)];
        let change = lagged_change(&rates, 2);
        assert_eq!(change, vec![None, None, Some(1.5), Some(0.5)]);
    }

    #[test]
    fn test_prepare_panel_drops_horizon_rows() {
        let n = 12;
        let panel = Panel::new(quarters(n))
            .with_column("real_price_index", (0..n).map(|i| Some(100.0 + i as f64)).collect())
            .unwrap()
            .with_column("dti", (0..n).map(|i| Some(i as f64)).collect())
            .unwrap()
            .with_column("regime", vec![Some(0.0); n])
            .unwrap();

        let prepared = prepare_panel(&panel, &spec(vec![], &["dti"])).unwrap();
        assert_eq!(prepared.len(), n - 4);
        assert!(prepared.has_column("fwd_ret_4q"));
        assert!(!panel.has_column("fwd_ret_4q"));
    }

    #[test]
    fn test_prepare_panel_with_trend_drops_both_ends() {
        let n = 12;
        let panel = Panel::new(quarters(n))
            .with_column("real_price_index", (0..n).map(|i| Some(100.0 + i as f64)).collect())
            .unwrap()
            .with_column("dti", (0..n).map(|i| Some(i as f64)).collect())
            .unwrap()
            .with_column("real_rate", (0..n).map(|i| Some(0.01 * i as f64)).collect())
            .unwrap()
            .with_column("regime", vec![Some(0.0); n])
            .unwrap();

        let spec = spec(vec![TrendFeature::new("dr4", "real_rate")], &["dti", "dr4"]);
        let prepared = prepare_panel(&panel, &spec).unwrap();

        // first H rows lack dr4, last H rows lack the forward return
        assert_eq!(prepared.len(), n - 8);
        assert_eq!(prepared.dates()[0], quarters(n)[4]);
    }

    #[test]
    fn test_prepare_panel_missing_columns_named() {
        let panel = Panel::new(quarters(3))
            .with_column("dti", vec![Some(1.0); 3])
            .unwrap();

        let err = prepare_panel(&panel, &spec(vec![], &["dti"])).unwrap_err();
        match err {
            PanelError::MissingColumns(cols) => {
                assert_eq!(cols, vec!["real_price_index".to_string(), "regime".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_prepare_panel_sorts_before_shifting() {
        let dates = quarters(6);
        let shuffled = vec![dates[5], dates[0], dates[3], dates[1], dates[4], dates[2]];
        let prices = vec![Some(6.0), Some(1.0), Some(4.0), Some(2.0), Some(5.0), Some(3.0)];
        let panel = Panel::new(shuffled)
            .with_column("real_price_index", prices)
            .unwrap()
            .with_column("dti", vec![Some(1.0); 6])
            .unwrap()
            .with_column("regime", vec![Some(0.0); 6])
            .unwrap();

        let mut s = spec(vec![], &["dti"]);
        s.horizon = 1;
        let prepared = prepare_panel(&panel, &s).unwrap();
        let fwd = prepared.column("fwd_ret_4q").unwrap();
        assert_relative_eq!(fwd[0].unwrap(), 2.0_f64.ln());
        assert_eq!(prepared.dates()[0], dates[0]);
    }
}
