//! Engine input rows.

use chrono::NaiveDate;

use crate::data::{Panel, PanelError};

/// One prepared panel row as seen by the walk-forward engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub regime: i64,
    /// Forward return over the configured horizon.
    pub forward_return: f64,
    /// Signal values, in the strategy's rule order.
    pub signals: Vec<Option<f64>>,
}

impl Observation {
    pub fn new(date: NaiveDate, regime: i64, forward_return: f64, signals: Vec<Option<f64>>) -> Self {
        Self {
            date,
            regime,
            forward_return,
            signals,
        }
    }

    /// Build engine rows from a prepared panel.
    ///
    /// Rows with a missing regime or forward return are skipped; a regime
    /// value that is not an integer is rejected.
    pub fn collect(
        panel: &Panel,
        regime_column: &str,
        forward_column: &str,
        signal_columns: &[String],
    ) -> Result<Vec<Self>, PanelError> {
        let mut required = vec![regime_column, forward_column];
        required.extend(signal_columns.iter().map(|s| s.as_str()));
        panel.require(&required)?;

        let regimes = panel.column(regime_column)?;
        let forward = panel.column(forward_column)?;
        let signals: Vec<&[Option<f64>]> = signal_columns
            .iter()
            .map(|c| panel.column(c))
            .collect::<Result<_, _>>()?;

        let mut rows = Vec::with_capacity(panel.len());
        for (i, date) in panel.dates().iter().enumerate() {
            let (Some(regime), Some(fwd)) = (regimes[i], forward[i]) else {
                continue;
            };
            if regime.fract() != 0.0 {
                return Err(PanelError::InvalidData(format!(
                    "regime value {} on {} is not an integer class",
                    regime, date
                )));
            }
            rows.push(Self::new(
                *date,
                regime as i64,
                fwd,
                signals.iter().map(|s| s[i].filter(|v| !v.is_nan())).collect(),
            ));
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Panel {
        let dates = (1..=3)
            .map(|m| NaiveDate::from_ymd_opt(2021, m, 1).unwrap())
            .collect();
        Panel::new(dates)
            .with_column("regime", vec![Some(0.0), Some(1.0), None])
            .unwrap()
            .with_column("fwd", vec![Some(0.01), Some(-0.02), Some(0.03)])
            .unwrap()
            .with_column("dti", vec![Some(4.0), None, Some(5.0)])
            .unwrap()
    }

    #[test]
    fn test_collect_rows() {
        let rows = Observation::collect(&panel(), "regime", "fwd", &["dti".to_string()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].regime, 0);
        assert_eq!(rows[1].signals, vec![None]);
        assert_eq!(rows[1].forward_return, -0.02);
    }

    #[test]
    fn test_collect_missing_signal_column() {
        let err = Observation::collect(&panel(), "regime", "fwd", &["dr4".to_string()]).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumns(c) if c == vec!["dr4".to_string()]));
    }

    #[test]
    fn test_collect_rejects_fractional_regime() {
        let p = panel()
            .with_column("regime", vec![Some(0.5), Some(1.0), Some(0.0)])
            .unwrap();
        assert!(matches!(
            Observation::collect(&p, "regime", "fwd", &["dti".to_string()]),
            Err(PanelError::InvalidData(_))
        ));
    }
}
