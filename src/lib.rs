pub mod config;
pub mod data;
pub mod features;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod walkforward;

// Re-export commonly used types
pub use config::{ConfigError, DataConfig, ExperimentConfig, StrategyConfig};
pub use data::{Panel, PanelError, PanelLoader};
pub use metrics::{EvaluationReport, SummaryStats};
pub use pipeline::{run_experiment, run_strategy, StrategyRun};
pub use report::{ReportError, ReportWriter};
pub use walkforward::{BacktestError, EvaluationFrame, StepRecord, WalkForwardEngine};
