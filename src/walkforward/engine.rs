//! Expanding-window walk-forward driver.
//!
//! At step `t` the training prefix is `rows[0..t]` and the test row is
//! `rows[t]`, for `t` from the window `W` up to the last row. Each step
//! selects thresholds on the prefix and applies them to the single test
//! row, so a run over `n` rows yields exactly `n - W` records.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, StrategyConfig};
use crate::data::PanelError;

use super::filter::FilterRule;
use super::grid::{CandidateSet, SignalRule};
use super::objective::{select_best, Objective, ObjectiveKind};
use super::observation::Observation;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Panel error: {0}")]
    Panel(#[from] PanelError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Row {date} carries {actual} signal(s), strategy expects {expected}")]
    SignalCount {
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },
}

/// Driver state for a step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fewer than `W` prior rows; no decision and no output.
    Warmup,
    /// Scoring candidates on the training prefix.
    Selecting,
    /// Applying the selected thresholds to the test row.
    Applying,
}

impl Phase {
    /// Phase following `self` once the cursor sits at step `t`. Selecting
    /// always hands over to applying on the same row.
    pub fn next(self, t: usize, window: usize) -> Self {
        match self {
            Phase::Selecting => Phase::Applying,
            Phase::Warmup | Phase::Applying if t < window => Phase::Warmup,
            Phase::Warmup | Phase::Applying => Phase::Selecting,
        }
    }
}

/// Where a step's thresholds came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    GridSearch,
    Fallback,
}

impl SelectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GridSearch => "grid_search",
            Self::Fallback => "fallback",
        }
    }
}

/// Thresholds chosen from one training prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdDecision {
    pub thresholds: Vec<f64>,
    pub source: SelectionSource,
    /// Winning objective score; `None` for fallback decisions.
    pub score: Option<f64>,
}

/// One out-of-sample step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// Index of the test row in the input rows.
    pub step: usize,
    pub date: NaiveDate,
    pub regime: i64,
    pub thresholds: Vec<f64>,
    pub source: SelectionSource,
    pub score: Option<f64>,
    pub exited: bool,
    pub baseline_ret: f64,
    pub strategy_ret: f64,
}

/// Output of a walk-forward run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationFrame {
    pub strategy: String,
    pub signal_columns: Vec<String>,
    pub eligible_regime: i64,
    pub records: Vec<StepRecord>,
}

impl EvaluationFrame {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn baseline_returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.baseline_ret).collect()
    }

    pub fn strategy_returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.strategy_ret).collect()
    }

    /// Number of steps decided by the fallback quantile.
    pub fn fallback_steps(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.source == SelectionSource::Fallback)
            .count()
    }
}

/// Walk-forward threshold filter for one strategy.
pub struct WalkForwardEngine {
    name: String,
    window: usize,
    min_support: usize,
    eligible_regime: i64,
    rules: Vec<SignalRule>,
    objective_kind: ObjectiveKind,
    objective: Box<dyn Objective>,
}

impl WalkForwardEngine {
    /// Build an engine from a validated strategy.
    pub fn new(config: &StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: config.name.clone(),
            window: config.window,
            min_support: config.min_support,
            eligible_regime: config.eligible_regime,
            rules: config.signals.clone(),
            objective_kind: config.objective,
            objective: config.objective.build(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Phase entered at step index `t`. Every selecting step is followed by
    /// applying on the same row.
    pub fn phase_at(&self, t: usize) -> Phase {
        if t < self.window {
            Phase::Warmup
        } else {
            Phase::Selecting
        }
    }

    /// Select thresholds using only the training prefix.
    pub fn decide(&self, train: &[Observation]) -> ThresholdDecision {
        let candidates =
            CandidateSet::build(train, &self.rules, self.eligible_regime, self.min_support);

        let grid = match candidates {
            CandidateSet::Fallback(thresholds) => {
                return ThresholdDecision {
                    thresholds,
                    source: SelectionSource::Fallback,
                    score: None,
                }
            }
            CandidateSet::GridSearch(grid) => grid,
        };

        let best = select_best(&grid, self.objective.as_ref(), |thresholds| {
            FilterRule::new(thresholds, self.eligible_regime).apply(train)
        });

        match best {
            Some((idx, score)) => ThresholdDecision {
                thresholds: grid[idx].clone(),
                source: SelectionSource::GridSearch,
                score: Some(score),
            },
            // Only reachable with an empty grid; hold every row.
            None => ThresholdDecision {
                thresholds: vec![f64::NAN; self.rules.len()],
                source: SelectionSource::Fallback,
                score: None,
            },
        }
    }

    /// Apply a decision to one out-of-sample row.
    fn apply(&self, t: usize, test: &Observation, decision: ThresholdDecision) -> StepRecord {
        let rule = FilterRule::new(&decision.thresholds, self.eligible_regime);
        let exited = rule.exits(test);
        let strategy_ret = rule.realized(test);

        debug!(
            "{} step {} ({}): thresholds {:?} via {}, exited {}",
            self.name,
            t,
            test.date,
            decision.thresholds,
            decision.source.as_str(),
            exited
        );

        StepRecord {
            step: t,
            date: test.date,
            regime: test.regime,
            thresholds: decision.thresholds,
            source: decision.source,
            score: decision.score,
            exited,
            baseline_ret: test.forward_return,
            strategy_ret,
        }
    }

    /// Run the walk-forward loop over date-ordered rows.
    pub fn run(&self, rows: &[Observation]) -> Result<EvaluationFrame, BacktestError> {
        if let Some(row) = rows.iter().find(|r| r.signals.len() != self.rules.len()) {
            return Err(BacktestError::SignalCount {
                date: row.date,
                expected: self.rules.len(),
                actual: row.signals.len(),
            });
        }

        let n = rows.len();
        let decisions = n.saturating_sub(self.window);
        info!(
            "Walk-forward {}: {} rows, window {}, objective {}, {} decisions",
            self.name,
            n,
            self.window,
            self.objective_kind.as_str(),
            decisions
        );

        let mut records = Vec::with_capacity(decisions);
        let mut pending: Option<ThresholdDecision> = None;
        let mut phase = Phase::Warmup.next(0, self.window);
        let mut t = 0;
        while t < n {
            match phase {
                Phase::Warmup => t += 1,
                Phase::Selecting => pending = Some(self.decide(&rows[..t])),
                Phase::Applying => {
                    if let Some(decision) = pending.take() {
                        records.push(self.apply(t, &rows[t], decision));
                    }
                    t += 1;
                }
            }
            phase = phase.next(t, self.window);
        }

        if records.is_empty() {
            warn!(
                "Strategy {} produced no decisions: {} rows do not exceed window {}",
                self.name, n, self.window
            );
        }

        Ok(EvaluationFrame {
            strategy: self.name.clone(),
            signal_columns: self.rules.iter().map(|r| r.column.clone()).collect(),
            eligible_regime: self.eligible_regime,
            records,
        })
    }
}
