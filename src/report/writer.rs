//! Flat-file output artifacts.
//!
//! Per strategy: `summary_<name>.csv`, `timeseries_<name>.csv`,
//! `params_<name>.csv` and `report_<name>.json`. Frames are built first and
//! written afterwards so a failure while building leaves no files behind.

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::data::Panel;
use crate::metrics::{EvaluationReport, SummaryStats};
use crate::walkforward::EvaluationFrame;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes run artifacts under one output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every artifact for one run. Returns the written paths.
    pub fn write_run(
        &self,
        frame: &EvaluationFrame,
        report: &EvaluationReport,
    ) -> Result<Vec<PathBuf>, ReportError> {
        let name = &frame.strategy;
        let mut outputs = vec![
            (format!("summary_{}.csv", name), summary_frame(report)?),
            (format!("timeseries_{}.csv", name), timeseries_frame(frame)?),
            (format!("params_{}.csv", name), params_frame(frame)?),
        ];
        let json = serde_json::to_string_pretty(report)?;

        fs::create_dir_all(&self.output_dir)?;

        let mut written = Vec::with_capacity(outputs.len() + 1);
        for (file_name, df) in outputs.iter_mut() {
            let path = self.output_dir.join(file_name.as_str());
            write_csv(df, &path)?;
            written.push(path);
        }

        let json_path = self.output_dir.join(format!("report_{}.json", name));
        fs::write(&json_path, json)?;
        written.push(json_path);

        info!("Wrote {} artifacts for {} to {}", written.len(), name, self.output_dir.display());
        Ok(written)
    }
}

/// Write a panel as CSV with a leading `date` column.
pub fn write_panel(panel: &Panel, path: &Path) -> Result<(), ReportError> {
    let mut df = panel_frame(panel)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_csv(&mut df, path)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ReportError> {
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

fn date_strings(dates: impl Iterator<Item = chrono::NaiveDate>) -> Vec<String> {
    dates.map(|d| d.format("%Y-%m-%d").to_string()).collect()
}

fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

fn stat_column(name: &str, rows: &[&SummaryStats], f: impl Fn(&SummaryStats) -> f64) -> Column {
    Series::new(name.into(), rows.iter().map(|s| f(s)).collect::<Vec<f64>>()).into()
}

fn summary_frame(report: &EvaluationReport) -> Result<DataFrame, ReportError> {
    let rows = report.rows();

    let df = DataFrame::new(vec![
        Series::new("name".into(), rows.iter().map(|s| s.name.clone()).collect::<Vec<_>>()).into(),
        Series::new("n".into(), rows.iter().map(|s| s.n as u64).collect::<Vec<_>>()).into(),
        stat_column("mean", &rows, |s| s.mean),
        stat_column("std", &rows, |s| s.std),
        stat_column("sharpe", &rows, |s| s.sharpe),
        stat_column("min", &rows, |s| s.min),
        stat_column("p05", &rows, |s| s.p05),
        stat_column("p50", &rows, |s| s.p50),
        stat_column("p95", &rows, |s| s.p95),
        stat_column("max", &rows, |s| s.max),
    ])?;
    Ok(df)
}

fn threshold_columns(frame: &EvaluationFrame) -> Vec<Column> {
    frame
        .signal_columns
        .iter()
        .enumerate()
        .map(|(i, signal)| {
            let values: Vec<f64> = frame
                .records
                .iter()
                .map(|r| r.thresholds.get(i).copied().unwrap_or(f64::NAN))
                .collect();
            Series::new(format!("{}_thr", signal).into(), values).into()
        })
        .collect()
}

fn timeseries_frame(frame: &EvaluationFrame) -> Result<DataFrame, ReportError> {
    let baseline = frame.baseline_returns();
    let strategy = frame.strategy_returns();

    let mut columns: Vec<Column> = vec![
        Series::new("date".into(), date_strings(frame.records.iter().map(|r| r.date))).into(),
        Series::new("regime".into(), frame.records.iter().map(|r| r.regime).collect::<Vec<_>>()).into(),
        Series::new("baseline_ret".into(), baseline.clone()).into(),
        Series::new("strategy_ret".into(), strategy.clone()).into(),
        Series::new("exited".into(), frame.records.iter().map(|r| r.exited).collect::<Vec<_>>()).into(),
    ];
    columns.extend(threshold_columns(frame));
    columns.push(Series::new("baseline_cum".into(), cumulative(&baseline)).into());
    columns.push(Series::new("strategy_cum".into(), cumulative(&strategy)).into());

    Ok(DataFrame::new(columns)?)
}

fn params_frame(frame: &EvaluationFrame) -> Result<DataFrame, ReportError> {
    let mut columns: Vec<Column> = vec![Series::new(
        "date".into(),
        date_strings(frame.records.iter().map(|r| r.date)),
    )
    .into()];
    columns.extend(threshold_columns(frame));
    columns.push(
        Series::new(
            "source".into(),
            frame.records.iter().map(|r| r.source.as_str()).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new("score".into(), frame.records.iter().map(|r| r.score).collect::<Vec<_>>()).into(),
    );

    Ok(DataFrame::new(columns)?)
}

fn panel_frame(panel: &Panel) -> Result<DataFrame, ReportError> {
    let mut columns: Vec<Column> =
        vec![Series::new("date".into(), date_strings(panel.dates().iter().copied())).into()];
    for name in panel.column_names() {
        if let Ok(values) = panel.column(name) {
            columns.push(Series::new(name.into(), values.to_vec()).into());
        }
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PanelLoader;
    use crate::walkforward::{SelectionSource, StepRecord};
    use chrono::NaiveDate;

    fn frame() -> EvaluationFrame {
        let records = (0..3)
            .map(|i| StepRecord {
                step: 20 + i,
                date: NaiveDate::from_ymd_opt(2005, 1, 1).unwrap() + chrono::Months::new(3 * i as u32),
                regime: 0,
                thresholds: vec![4.0 + i as f64, 0.1],
                source: if i == 0 {
                    SelectionSource::Fallback
                } else {
                    SelectionSource::GridSearch
                },
                score: if i == 0 { None } else { Some(-0.01) },
                exited: i == 1,
                baseline_ret: 0.02,
                strategy_ret: if i == 1 { 0.0 } else { 0.02 },
            })
            .collect();
        EvaluationFrame {
            strategy: "dti_dr4_filter".to_string(),
            signal_columns: vec!["dti".to_string(), "dr4".to_string()],
            eligible_regime: 0,
            records,
        }
    }

    #[test]
    fn test_timeseries_columns() {
        let df = timeseries_frame(&frame()).unwrap();
        let names: Vec<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "date",
                "regime",
                "baseline_ret",
                "strategy_ret",
                "exited",
                "dti_thr",
                "dr4_thr",
                "baseline_cum",
                "strategy_cum"
            ]
        );
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_cumulative() {
        assert_eq!(cumulative(&[1.0, -2.0, 3.0]), vec![1.0, -1.0, 2.0]);
    }

    #[test]
    fn test_write_run_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("strategy_filter");
        let f = frame();
        let report = EvaluationReport::from_frame(&f);

        let written = ReportWriter::new(&out).write_run(&f, &report).unwrap();
        assert_eq!(written.len(), 4);
        for path in &written {
            assert!(path.exists(), "{}", path.display());
        }

        let params = std::fs::read_to_string(out.join("params_dti_dr4_filter.csv")).unwrap();
        let header = params.lines().next().unwrap();
        assert_eq!(header, "date,dti_thr,dr4_thr,source,score");
        assert!(params.contains("fallback"));

        let summary = std::fs::read_to_string(out.join("summary_dti_dr4_filter.csv")).unwrap();
        assert!(summary.starts_with("name,n,mean,std,sharpe,min,p05,p50,p95,max"));
        assert_eq!(summary.lines().count(), 3);
    }

    #[test]
    fn test_write_panel_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        let panel = Panel::new(vec![
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
        ])
        .with_column("dti", vec![Some(4.5), None])
        .unwrap();

        write_panel(&panel, &path).unwrap();
        let reloaded = PanelLoader::new("date").load_csv(&path).unwrap();
        assert_eq!(reloaded.dates(), panel.dates());
        assert_eq!(reloaded.column("dti").unwrap(), &[Some(4.5), None]);
    }
}
