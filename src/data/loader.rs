//! CSV loading into [`Panel`]s.
//!
//! The master panel is a flat CSV with a date column and numeric columns.
//! Non-numeric columns other than the date (region slugs, labels) are
//! not carried into the panel.

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

use super::panel::{Panel, PanelError};

/// Date formats accepted in the date column, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// Loader for flat CSV panels.
pub struct PanelLoader {
    date_column: String,
}

impl PanelLoader {
    /// Create a loader reading dates from `date_column`.
    pub fn new(date_column: &str) -> Self {
        Self {
            date_column: date_column.to_string(),
        }
    }

    /// Load a CSV file into a panel. Rows keep file order.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<Panel, PanelError> {
        let df = read_csv(path.as_ref())?;
        self.from_dataframe(&df)
    }

    /// Convert a DataFrame into a panel.
    pub fn from_dataframe(&self, df: &DataFrame) -> Result<Panel, PanelError> {
        let date_col = df
            .column(&self.date_column)
            .map_err(|_| PanelError::MissingColumns(vec![self.date_column.clone()]))?;
        let dates = parse_dates(date_col, &self.date_column)?;

        let mut panel = Panel::new(dates);
        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == self.date_column {
                continue;
            }
            if !is_numeric(column.dtype()) {
                debug!("Skipping non-numeric column '{}'", name);
                continue;
            }
            let values: Vec<Option<f64>> = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .collect();
            panel.insert_column(name, values)?;
        }

        Ok(panel)
    }
}

/// Read a headered CSV file.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame, PanelError> {
    if !path.exists() {
        return Err(PanelError::FileNotFound(path.display().to_string()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
            | DataType::Boolean
    )
}

/// Parse a date column; every row must hold a parseable date.
fn parse_dates(column: &Column, name: &str) -> Result<Vec<NaiveDate>, PanelError> {
    let as_str = column.cast(&DataType::String)?;
    as_str
        .str()?
        .into_iter()
        .map(|value| {
            let raw = value.unwrap_or_default();
            parse_date(raw).ok_or_else(|| PanelError::DateParse {
                column: name.to_string(),
                value: raw.to_string(),
            })
        })
        .collect()
}

/// Parse a single date. Timestamps keep only their date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split(|c| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
