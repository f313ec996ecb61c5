//! Walk-forward threshold selection module.
//!
//! Expanding-window evaluation of regime-conditional threshold filters:
//! - Candidates: quantiles of the signal on eligible training rows
//! - Selection: objective argmax, first candidate wins ties
//! - Application: one out-of-sample row per step

pub mod engine;
pub mod filter;
pub mod grid;
pub mod objective;
pub mod observation;

pub use engine::{
    BacktestError, EvaluationFrame, Phase, SelectionSource, StepRecord, ThresholdDecision,
    WalkForwardEngine,
};
pub use filter::FilterRule;
pub use grid::{CandidateSet, QuantileGrid, SignalRule};
pub use objective::{select_best, Objective, ObjectiveKind, SharpeObjective, TailQuantileObjective};
pub use observation::Observation;
