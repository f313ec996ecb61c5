//! Output artifacts: summary, evaluation time series, chosen parameters.

pub mod writer;

pub use writer::{write_panel, ReportError, ReportWriter};
