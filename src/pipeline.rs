//! End-to-end strategy runs: load, prepare, walk forward, summarize.
//!
//! Strategies are independent. Each one prepares its own copy of the panel,
//! so runs can execute in parallel and in any order.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::info;

use crate::config::{DataConfig, ExperimentConfig, StrategyConfig};
use crate::data::{Panel, PanelError, PanelLoader};
use crate::features::prepare_panel;
use crate::metrics::EvaluationReport;
use crate::walkforward::{BacktestError, EvaluationFrame, Observation, WalkForwardEngine};

/// Output of one strategy run.
#[derive(Debug, Clone)]
pub struct StrategyRun {
    pub frame: EvaluationFrame,
    pub report: EvaluationReport,
}

/// Load the master panel and apply the configured date range.
pub fn load_panel(data: &DataConfig) -> Result<Panel, PanelError> {
    let panel = PanelLoader::new(&data.date_column).load_csv(&data.input)?;
    let start = data.start.unwrap_or(NaiveDate::MIN);
    let end = data.end.unwrap_or(NaiveDate::MAX);

    let filtered = panel.between(start, end);
    info!(
        "Loaded {} rows from {} ({} in range)",
        panel.len(),
        data.input.display(),
        filtered.len()
    );
    Ok(filtered)
}

/// Run one strategy over a loaded panel.
pub fn run_strategy(
    panel: &Panel,
    data: &DataConfig,
    horizon: usize,
    strategy: &StrategyConfig,
) -> Result<StrategyRun, BacktestError> {
    let engine = WalkForwardEngine::new(strategy)?;
    let spec = strategy.preparation(data, horizon);

    let prepared = prepare_panel(panel, &spec)?;
    let rows = Observation::collect(
        &prepared,
        &spec.regime_column,
        &spec.forward_column,
        &spec.signal_columns,
    )?;

    let frame = engine.run(&rows)?;
    let report = EvaluationReport::from_frame(&frame);
    info!(
        "{}: {} decisions, strategy sharpe {:.2} vs baseline {:.2}, filtered {:.1}%",
        frame.strategy,
        frame.len(),
        report.strategy_stats.sharpe,
        report.baseline.sharpe,
        report.filtered_frequency * 100.0
    );

    Ok(StrategyRun { frame, report })
}

/// Run every configured strategy. Results keep configuration order; any
/// failure fails the whole experiment.
pub fn run_experiment(
    config: &ExperimentConfig,
    panel: &Panel,
) -> Result<Vec<StrategyRun>, BacktestError> {
    config.validate()?;
    info!("Running {} strategies", config.strategies.len());

    config
        .strategies
        .par_iter()
        .map(|strategy| run_strategy(panel, &config.data, config.horizon, strategy))
        .collect()
}
