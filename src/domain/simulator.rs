//! Day-by-day portfolio simulation.
//!
//! The simulator walks the trading calendar in order, re-evaluating the
//! strategy tree under one of two disciplines:
//!
//! - **time-based** (threshold = 0): re-evaluate only on scheduler trigger
//!   dates, mark the existing position to market on every other day;
//! - **threshold-based** (threshold > 0): re-evaluate every day, but only
//!   re-strike quantities when the realized weights have drifted from the
//!   last-struck targets by more than the threshold.
//!
//! A failed evaluation wipes the whole accumulated history and restarts the
//! bookkeeping from the initial investment at the next successful day;
//! iteration over trading days itself never restarts.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::calendar::trigger_dates;
use crate::domain::dataset::{Dataset, PRICE_COLUMN};
use crate::domain::error::{ArborError, EvalError};
use crate::domain::holdings::{evaluate, Holdings};
use crate::domain::issues::ErrorTracker;
use crate::domain::strategy::Strategy;
use crate::ports::metrics_port::{MetricsPort, MetricsRequest};

/// Asset identifier to share count. Shares are fractional.
pub type Quantities = HashMap<String, f64>;

/// The three date-indexed series a simulation produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoricalRecord {
    /// Days on which holdings were actually (re)struck.
    pub traded_dates: Vec<NaiveDate>,
    /// Portfolio value on every trading day.
    pub portfolio_values: BTreeMap<NaiveDate, f64>,
    /// Realized asset weights on every trading day with an active position.
    pub asset_weights: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl HistoricalRecord {
    fn clear(&mut self) {
        self.traded_dates.clear();
        self.portfolio_values.clear();
        self.asset_weights.clear();
    }
}

/// Result of [`Simulator::backtest`].
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    #[serde(flatten)]
    pub record: HistoricalRecord,
    /// Delegated to the metrics port; `null` when the strategy never traded
    /// or no port was supplied.
    pub metrics: Option<serde_json::Value>,
    /// Data-availability diagnostics, populated regardless of outcome.
    pub issues: crate::domain::issues::IssueReport,
}

/// Position state carried across the day loop.
#[derive(Debug, Default)]
struct PositionState {
    latest_holdings: Holdings,
    latest_quantities: Quantities,
    value_tracker: f64,
}

pub struct Simulator<'a> {
    strategy: &'a Strategy,
    dataset: &'a Dataset,
    trading_days: Vec<NaiveDate>,
    initial_investment: f64,
}

impl<'a> Simulator<'a> {
    pub fn new(
        strategy: &'a Strategy,
        dataset: &'a Dataset,
        trading_days: Vec<NaiveDate>,
        initial_investment: f64,
    ) -> Result<Self, ArborError> {
        if strategy.root().is_none() {
            return Err(ArborError::StrategyInvalid {
                reason: "algorithm root must be an instructions task".into(),
            });
        }
        Ok(Simulator {
            strategy,
            dataset,
            trading_days,
            initial_investment,
        })
    }

    /// Runs the simulation and assembles the full report: record, metrics
    /// (when anything traded and a port is present), and availability issues.
    pub fn backtest(&self, metrics_port: Option<&dyn MetricsPort>) -> BacktestReport {
        let record = self.run();
        let issues = ErrorTracker::scan(
            self.strategy,
            self.dataset,
            self.trading_days.first().copied(),
        );

        let metrics = if record.traded_dates.is_empty() {
            None
        } else {
            metrics_port.and_then(|port| {
                let first = record.portfolio_values.keys().next().copied()?;
                let last = record.portfolio_values.keys().next_back().copied()?;
                Some(port.compute(&MetricsRequest {
                    portfolio_values: &record.portfolio_values,
                    asset_weights: &record.asset_weights,
                    benchmarks: &self.strategy.benchmarks,
                    first_date: first,
                    last_date: last,
                }))
            })
        };

        BacktestReport {
            record,
            metrics,
            issues,
        }
    }

    /// Runs the day loop under the discipline the threshold selects.
    pub fn run(&self) -> HistoricalRecord {
        if self.strategy.trading_threshold == 0.0 {
            self.run_time_based()
        } else {
            self.run_threshold_based()
        }
    }

    fn run_time_based(&self) -> HistoricalRecord {
        let triggers: HashSet<NaiveDate> =
            trigger_dates(&self.trading_days, self.strategy.trading_frequency)
                .into_iter()
                .collect();

        let mut record = HistoricalRecord::default();
        let mut state = self.initial_state();

        for &date in &self.trading_days {
            if triggers.contains(&date) {
                // Mark the existing position to market before re-evaluating;
                // with no position yet the tracker is the initial investment.
                if state.latest_holdings.is_empty() {
                    record.portfolio_values.insert(date, state.value_tracker);
                } else {
                    match self.portfolio_value(date, &state.latest_quantities) {
                        Ok(value) => {
                            state.value_tracker = value;
                            record.portfolio_values.insert(date, value);
                        }
                        Err(err) => {
                            self.reset(&err, &mut record, &mut state);
                            continue;
                        }
                    }
                }

                match self.evaluate_holdings(date) {
                    Ok(holdings) => {
                        if let Err(err) = self.strike(date, holdings, &mut record, &mut state) {
                            self.reset(&err, &mut record, &mut state);
                        }
                    }
                    Err(err) => self.reset(&err, &mut record, &mut state),
                }
            } else if !state.latest_holdings.is_empty() {
                if let Err(err) = self.mark_to_market(date, &mut record, &mut state) {
                    self.reset(&err, &mut record, &mut state);
                }
            }
        }

        record
    }

    fn run_threshold_based(&self) -> HistoricalRecord {
        let mut record = HistoricalRecord::default();
        let mut state = self.initial_state();

        for &date in &self.trading_days {
            // Drift is measured against freshly evaluated target weights, so
            // the tree is evaluated on every trading day.
            let holdings = match self.evaluate_holdings(date) {
                Ok(holdings) => holdings,
                Err(err) => {
                    self.reset(&err, &mut record, &mut state);
                    continue;
                }
            };

            if state.latest_holdings.is_empty() {
                record.portfolio_values.insert(date, state.value_tracker);
                if let Err(err) = self.strike(date, holdings, &mut record, &mut state) {
                    self.reset(&err, &mut record, &mut state);
                }
                continue;
            }

            let current_weights = match self.mark_to_market(date, &mut record, &mut state) {
                Ok(weights) => weights,
                Err(err) => {
                    self.reset(&err, &mut record, &mut state);
                    continue;
                }
            };

            if total_drift(&state.latest_holdings, &current_weights)
                > self.strategy.trading_threshold
            {
                // Re-strike at the fresh targets; the struck weights replace
                // the marked-to-market snapshot for the day.
                if let Err(err) = self.strike(date, holdings, &mut record, &mut state) {
                    self.reset(&err, &mut record, &mut state);
                }
            }
        }

        record
    }

    fn initial_state(&self) -> PositionState {
        PositionState {
            value_tracker: self.initial_investment,
            ..PositionState::default()
        }
    }

    fn evaluate_holdings(&self, date: NaiveDate) -> Result<Holdings, EvalError> {
        // Root shape is checked in `new`.
        let (tasks, weight) = match self.strategy.root() {
            Some(root) => root,
            None => return Ok(Holdings::new()),
        };
        evaluate(self.dataset, date, tasks, weight, 1.0)
    }

    /// Converts fresh holdings into quantities at the tracked value and
    /// records the strike: weights, traded date, carried state.
    fn strike(
        &self,
        date: NaiveDate,
        holdings: Holdings,
        record: &mut HistoricalRecord,
        state: &mut PositionState,
    ) -> Result<(), EvalError> {
        let quantities = self.quantities_for(date, &holdings, state.value_tracker)?;
        let weights = self.portfolio_weights(date, &quantities, state.value_tracker)?;
        record.asset_weights.insert(date, weights);
        record.traded_dates.push(date);
        state.latest_holdings = holdings;
        state.latest_quantities = quantities;
        Ok(())
    }

    /// Records value and realized weights for `date` from the carried
    /// quantities, without reallocating. Returns the realized weights.
    fn mark_to_market(
        &self,
        date: NaiveDate,
        record: &mut HistoricalRecord,
        state: &mut PositionState,
    ) -> Result<HashMap<String, f64>, EvalError> {
        let value = self.portfolio_value(date, &state.latest_quantities)?;
        let weights = self.portfolio_weights(date, &state.latest_quantities, value)?;
        state.value_tracker = value;
        record.portfolio_values.insert(date, value);
        record.asset_weights.insert(date, weights.clone());
        Ok(weights)
    }

    /// The single named reset transition: wipe the record and the carried
    /// position, return the tracker to the initial investment.
    fn reset(&self, err: &EvalError, record: &mut HistoricalRecord, state: &mut PositionState) {
        log::debug!("history reset: {err}");
        record.clear();
        state.latest_holdings.clear();
        state.latest_quantities.clear();
        state.value_tracker = self.initial_investment;
    }

    fn price_at(&self, identifier: &str, date: NaiveDate) -> Result<f64, EvalError> {
        self.dataset
            .get(identifier)
            .and_then(|series| series.value_at(date, PRICE_COLUMN))
            .filter(|price| !price.is_nan())
            .ok_or_else(|| EvalError::DataUnavailable {
                identifier: identifier.to_string(),
                date,
            })
    }

    fn quantities_for(
        &self,
        date: NaiveDate,
        holdings: &Holdings,
        portfolio_value: f64,
    ) -> Result<Quantities, EvalError> {
        let mut quantities = Quantities::new();
        for (asset, weight) in holdings {
            let price = self.price_at(asset, date)?;
            *quantities.entry(asset.clone()).or_insert(0.0) += portfolio_value * weight / price;
        }
        Ok(quantities)
    }

    fn portfolio_value(&self, date: NaiveDate, quantities: &Quantities) -> Result<f64, EvalError> {
        let mut value = 0.0;
        for (asset, quantity) in quantities {
            value += quantity * self.price_at(asset, date)?;
        }
        Ok(value)
    }

    fn portfolio_weights(
        &self,
        date: NaiveDate,
        quantities: &Quantities,
        portfolio_value: f64,
    ) -> Result<HashMap<String, f64>, EvalError> {
        let mut weights = HashMap::new();
        for (asset, quantity) in quantities {
            let price = self.price_at(asset, date)?;
            weights.insert(asset.clone(), quantity * price / portfolio_value);
        }
        Ok(weights)
    }
}

/// Total drift between last-struck target weights and currently realized
/// weights: the sum of absolute differences over the union of assets.
pub fn total_drift(target: &Holdings, current: &HashMap<String, f64>) -> f64 {
    let mut drift = 0.0;
    for (asset, target_weight) in target {
        let current_weight = current.get(asset).copied().unwrap_or(0.0);
        drift += (target_weight - current_weight).abs();
    }
    for (asset, current_weight) in current {
        if !target.contains_key(asset) {
            drift += current_weight.abs();
        }
    }
    drift
}
