//! In-memory observation panel.
//!
//! A panel is one pooled time series: a date per row plus any number of
//! named real-valued columns. Missing values are `None`. Every derived
//! panel is a fresh value; operations never write back into their input.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Column '{name}' has {actual} rows, panel has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unparseable date '{value}' in column '{column}'")]
    DateParse { column: String, value: String },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Time-ordered panel of observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl Panel {
    /// Create a panel with dates only.
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            columns: BTreeMap::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Result<&[Option<f64>], PanelError> {
        self.columns
            .get(name)
            .map(|c| c.as_slice())
            .ok_or_else(|| PanelError::MissingColumns(vec![name.to_string()]))
    }

    /// Insert or replace a column.
    pub fn insert_column(
        &mut self,
        name: &str,
        values: Vec<Option<f64>>,
    ) -> Result<(), PanelError> {
        if values.len() != self.dates.len() {
            return Err(PanelError::LengthMismatch {
                name: name.to_string(),
                expected: self.dates.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Builder-style variant of [`Panel::insert_column`].
    pub fn with_column(mut self, name: &str, values: Vec<Option<f64>>) -> Result<Self, PanelError> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Fail with every absent column named.
    pub fn require(&self, names: &[&str]) -> Result<(), PanelError> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !self.columns.contains_key(**n))
            .map(|n| n.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PanelError::MissingColumns(missing))
        }
    }

    /// Stable sort by date. Rows sharing a date keep their input order.
    pub fn sorted_by_date(&self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.dates[i]);
        self.take(&order)
    }

    /// Keep rows where every listed column is present.
    pub fn drop_missing(&self, names: &[&str]) -> Result<Self, PanelError> {
        self.require(names)?;

        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| {
                names
                    .iter()
                    .all(|n| self.columns[*n][i].is_some_and(|v| !v.is_nan()))
            })
            .collect();

        Ok(self.take(&keep))
    }

    /// Keep rows whose date falls in `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.dates[i] >= start && self.dates[i] <= end)
            .collect();
        self.take(&keep)
    }

    /// Select rows by index, in the given order.
    fn take(&self, rows: &[usize]) -> Self {
        let dates = rows.iter().map(|&i| self.dates[i]).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), rows.iter().map(|&i| values[i]).collect()))
            .collect();
        Self { dates, columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn sample() -> Panel {
        Panel::new(vec![date(2020, 7), date(2020, 1), date(2020, 4)])
            .with_column("dti", vec![Some(3.0), Some(1.0), None])
            .unwrap()
            .with_column("regime", vec![Some(0.0), Some(1.0), Some(0.0)])
            .unwrap()
    }

    #[test]
    fn test_require_names_all_missing_columns() {
        let panel = sample();
        match panel.require(&["dti", "price", "rate"]) {
            Err(PanelError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["price".to_string(), "rate".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(panel.require(&["dti", "regime"]).is_ok());
    }

    #[test]
    fn test_sorted_by_date_moves_columns_with_rows() {
        let sorted = sample().sorted_by_date();
        assert_eq!(sorted.dates(), &[date(2020, 1), date(2020, 4), date(2020, 7)]);
        assert_eq!(sorted.column("dti").unwrap(), &[Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_drop_missing_leaves_input_untouched() {
        let panel = sample();
        let dropped = panel.drop_missing(&["dti"]).unwrap();
        assert_eq!(dropped.len(), 2);
        assert_eq!(panel.len(), 3);
    }

    #[test]
    fn test_drop_missing_treats_nan_as_missing() {
        let panel = Panel::new(vec![date(2020, 1), date(2020, 4)])
            .with_column("x", vec![Some(f64::NAN), Some(1.0)])
            .unwrap();
        assert_eq!(panel.drop_missing(&["x"]).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_column_rejects_wrong_length() {
        let mut panel = sample();
        let err = panel.insert_column("short", vec![Some(1.0)]).unwrap_err();
        assert!(matches!(err, PanelError::LengthMismatch { expected: 3, actual: 1, .. }));
    }
}
