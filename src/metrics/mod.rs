//! Performance metrics module.
//!
//! Provides:
//! - Descriptive statistics (population std, linear quantiles)
//! - Baseline vs strategy summaries and the filtered-frequency diagnostic
//! - Information coefficient of signals against forward returns

pub mod ic;
pub mod stats;
pub mod summary;

pub use ic::{ic_by_regime, information_coefficient, rolling_ic, rolling_ic_in_regime, IcResult};
pub use summary::{filtered_frequency, EvaluationReport, SummaryStats};
