//! Holdings evaluation: the recursive walk that turns a task tree plus a
//! dataset into a target allocation for one date.
//!
//! # Weight propagation
//!
//! Each task at index `i` among `n` siblings evaluates at
//! `relative_weight / n` under an equal split, or `weights[i] *
//! relative_weight` under an explicit list. An `instructions` node installs
//! its own weight spec for its children; an `expression` branch keeps the
//! inherited spec and re-splits the task's relative weight across the chosen
//! branch's tasks. For a well-formed tree the relative weights at which `buy`
//! leaves fire sum to 1.
//!
//! # Failure
//!
//! Evaluation is all-or-nothing per date: the first missing series, missing
//! row, or `NaN` indicator value anywhere in the reachable tree short-circuits
//! the walk and the whole date yields an error, never a partial allocation.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::dataset::Dataset;
use crate::domain::error::EvalError;
use crate::domain::strategy::{indicator_column, Operand, Task, WeightSpec};

/// Target allocation: asset identifier to weight fraction.
pub type Holdings = HashMap<String, f64>;

/// Evaluates `tasks` on `date`, producing a complete holdings map or the
/// first failure encountered.
///
/// Explicit weight lists must already be length-checked against their task
/// lists ([`Strategy::validate`](crate::domain::strategy::Strategy::validate)).
pub fn evaluate(
    dataset: &Dataset,
    date: NaiveDate,
    tasks: &[Task],
    weight: &WeightSpec,
    relative_weight: f64,
) -> Result<Holdings, EvalError> {
    let mut holdings = Holdings::new();
    walk(dataset, date, tasks, weight, relative_weight, &mut holdings)?;
    Ok(holdings)
}

fn walk(
    dataset: &Dataset,
    date: NaiveDate,
    tasks: &[Task],
    weight: &WeightSpec,
    relative_weight: f64,
    holdings: &mut Holdings,
) -> Result<(), EvalError> {
    for (index, task) in tasks.iter().enumerate() {
        let child_weight = child_relative_weight(tasks.len(), index, weight, relative_weight);

        match task {
            Task::Buy { asset } => {
                let series =
                    dataset
                        .get(asset)
                        .ok_or_else(|| EvalError::DataUnavailable {
                            identifier: asset.clone(),
                            date,
                        })?;
                if !series.has_date(date) {
                    return Err(EvalError::DataUnavailable {
                        identifier: asset.clone(),
                        date,
                    });
                }
                // The same asset reached through several branches accumulates.
                *holdings.entry(asset.clone()).or_insert(0.0) += child_weight;
            }
            Task::Expression {
                conditions,
                true_branch,
                false_branch,
            } => {
                let left = resolve_operand(dataset, date, &conditions.condition1)?;
                let right = resolve_operand(dataset, date, &conditions.condition2)?;
                let branch = if conditions.operator.apply(left, right) {
                    true_branch
                } else {
                    false_branch
                };
                walk(dataset, date, branch, weight, child_weight, holdings)?;
            }
            Task::Instructions { weight, tasks } => {
                walk(dataset, date, tasks, weight, child_weight, holdings)?;
            }
        }
    }
    Ok(())
}

/// The exact propagation rule: equal splits divide by sibling count, explicit
/// lists multiply by the child's entry.
fn child_relative_weight(
    count: usize,
    index: usize,
    weight: &WeightSpec,
    relative_weight: f64,
) -> f64 {
    match weight {
        WeightSpec::Equal => relative_weight / count as f64,
        WeightSpec::Specified(weights) => weights[index] * relative_weight,
    }
}

fn resolve_operand(
    dataset: &Dataset,
    date: NaiveDate,
    operand: &Operand,
) -> Result<f64, EvalError> {
    match operand {
        Operand::Constant { fixed_value } => Ok(*fixed_value),
        Operand::Indicator {
            function,
            period,
            source,
        } => {
            let identifier = source.identifier();
            let series =
                dataset
                    .get(identifier)
                    .ok_or_else(|| EvalError::DataUnavailable {
                        identifier: identifier.to_string(),
                        date,
                    })?;
            if !series.has_date(date) {
                return Err(EvalError::DataUnavailable {
                    identifier: identifier.to_string(),
                    date,
                });
            }
            let column = indicator_column(function, *period);
            let value =
                series
                    .value_at(date, &column)
                    .ok_or_else(|| EvalError::IndicatorUndefined {
                        identifier: identifier.to_string(),
                        indicator: column.clone(),
                        date,
                    })?;
            if value.is_nan() {
                return Err(EvalError::IndicatorUndefined {
                    identifier: identifier.to_string(),
                    indicator: column,
                    date,
                });
            }
            Ok(value)
        }
    }
}
