//! Strategy definition: the declarative task tree and its JSON document form.
//!
//! A strategy document looks like:
//!
//! ```json
//! {
//!   "start_date": "2020-01-01",
//!   "end_date": "2021-01-01",
//!   "name": "demo",
//!   "benchmarks": ["SPY"],
//!   "trading_frequency": "monthly",
//!   "trading_threshold": 0,
//!   "algorithm": {
//!     "type": "instructions",
//!     "weight": 1,
//!     "tasks": [
//!       {"type": "buy", "asset": "AAPL"},
//!       {"type": "buy", "asset": "MSFT"}
//!     ]
//!   }
//! }
//! ```
//!
//! `weight` is the scalar `1` for an equal split across siblings, or an array
//! of per-child multipliers. Expression branches do not carry a weight of
//! their own: they inherit the enclosing weight spec and relative weight.

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::calendar::Frequency;
use crate::domain::error::ArborError;

/// One node of the strategy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Task {
    Buy {
        asset: String,
    },
    Expression {
        conditions: Conditions,
        #[serde(rename = "true")]
        true_branch: Vec<Task>,
        #[serde(rename = "false")]
        false_branch: Vec<Task>,
    },
    Instructions {
        weight: WeightSpec,
        tasks: Vec<Task>,
    },
}

/// The comparison an `expression` task branches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub operator: Comparison,
    pub condition1: Operand,
    pub condition2: Operand,
}

/// One side of a comparison: an indicator lookup or a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Indicator {
        function: String,
        period: u32,
        #[serde(flatten)]
        source: SeriesRef,
    },
    Constant {
        #[serde(rename = "fixedValue")]
        fixed_value: f64,
    },
}

impl Operand {
    /// Dataset column holding this indicator's values, e.g. `"sma 20"`.
    pub fn column(&self) -> Option<String> {
        match self {
            Operand::Indicator {
                function, period, ..
            } => Some(indicator_column(function, *period)),
            Operand::Constant { .. } => None,
        }
    }
}

/// Column name for an indicator lookup.
pub fn indicator_column(function: &str, period: u32) -> String {
    format!("{function} {period}")
}

/// What an indicator operand is computed over: an asset price series or an
/// economic data series. The distinction only matters for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SeriesRef {
    #[serde(rename = "asset")]
    Asset(String),
    #[serde(rename = "series")]
    Series(String),
}

impl SeriesRef {
    pub fn identifier(&self) -> &str {
        match self {
            SeriesRef::Asset(id) | SeriesRef::Series(id) => id,
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, SeriesRef::Series(_))
    }
}

/// How a node's relative weight is split across its children.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightSpec {
    /// Split the parent's relative weight evenly across siblings.
    Equal,
    /// Per-child multipliers, one per child index.
    Specified(Vec<f64>),
}

impl Serialize for WeightSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WeightSpec::Equal => serializer.serialize_u64(1),
            WeightSpec::Specified(weights) => weights.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for WeightSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Scalar(f64),
            List(Vec<f64>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Scalar(s) if s == 1.0 => Ok(WeightSpec::Equal),
            Repr::Scalar(s) => Err(D::Error::custom(format!(
                "scalar weight must be 1 (the equal-split sentinel), got {s}"
            ))),
            Repr::List(weights) => Ok(WeightSpec::Specified(weights)),
        }
    }
}

/// Comparison operators usable in an `expression` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Lt => left < right,
            Comparison::Gt => left > right,
            Comparison::Eq => left == right,
            Comparison::Ge => left >= right,
            Comparison::Le => left <= right,
            Comparison::Ne => left != right,
        }
    }
}

/// A full strategy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub benchmarks: Vec<String>,
    pub trading_frequency: Frequency,
    /// Zero selects calendar-triggered rebalancing; a positive value selects
    /// drift-triggered rebalancing with this threshold.
    #[serde(default)]
    pub trading_threshold: f64,
    pub algorithm: Task,
}

/// Everything the strategy tree needs from the dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirements {
    /// Assets named by `buy` leaves, in first-seen order.
    pub assets: Vec<String>,
    /// Indicator operands from `expression` conditions, deduplicated by
    /// identifier and column.
    pub indicators: Vec<IndicatorRequirement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRequirement {
    pub source: SeriesRef,
    pub function: String,
    pub period: u32,
}

impl IndicatorRequirement {
    pub fn column(&self) -> String {
        indicator_column(&self.function, self.period)
    }
}

impl Strategy {
    pub fn from_json(content: &str) -> Result<Self, ArborError> {
        serde_json::from_str(content).map_err(|e| ArborError::StrategyParse {
            reason: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, ArborError> {
        serde_json::to_string_pretty(self).map_err(|e| ArborError::StrategyParse {
            reason: e.to_string(),
        })
    }

    /// The root task list and weight spec. `None` if the root is not an
    /// `instructions` node.
    pub fn root(&self) -> Option<(&[Task], &WeightSpec)> {
        match &self.algorithm {
            Task::Instructions { weight, tasks } => Some((tasks, weight)),
            _ => None,
        }
    }

    /// Structural validation, fatal at load time.
    ///
    /// Checks that the root is an `instructions` node, that the date range is
    /// ordered, that the threshold is not negative, and that every explicit
    /// weight list matches the length of the task list it applies to,
    /// including expression branches, which index into the inherited list.
    pub fn validate(&self) -> Result<(), ArborError> {
        if self.start_date > self.end_date {
            return Err(ArborError::StrategyInvalid {
                reason: format!(
                    "start_date {} is after end_date {}",
                    self.start_date, self.end_date
                ),
            });
        }
        if self.trading_threshold < 0.0 {
            return Err(ArborError::StrategyInvalid {
                reason: format!(
                    "trading_threshold must not be negative, got {}",
                    self.trading_threshold
                ),
            });
        }
        let (tasks, weight) = self.root().ok_or_else(|| ArborError::StrategyInvalid {
            reason: "algorithm root must be an instructions task".into(),
        })?;
        validate_forest(tasks, weight)
    }

    /// Flattens the tree into its data requirements.
    pub fn requirements(&self) -> Requirements {
        let mut requirements = Requirements::default();
        collect_requirements(std::slice::from_ref(&self.algorithm), &mut requirements);
        requirements
    }

    /// Every series identifier the backtest needs: buy assets, operand
    /// sources, and benchmarks, deduplicated in first-seen order.
    pub fn identifiers(&self) -> Vec<String> {
        let requirements = self.requirements();
        let mut identifiers = requirements.assets;
        for indicator in &requirements.indicators {
            let id = indicator.source.identifier();
            if !identifiers.iter().any(|existing| existing == id) {
                identifiers.push(id.to_string());
            }
        }
        for benchmark in &self.benchmarks {
            if !identifiers.iter().any(|existing| existing == benchmark) {
                identifiers.push(benchmark.clone());
            }
        }
        identifiers
    }
}

fn validate_forest(tasks: &[Task], weight: &WeightSpec) -> Result<(), ArborError> {
    if let WeightSpec::Specified(weights) = weight {
        if weights.len() != tasks.len() {
            return Err(ArborError::StructuralMismatch {
                weights: weights.len(),
                tasks: tasks.len(),
            });
        }
    }
    for task in tasks {
        match task {
            Task::Buy { .. } => {}
            Task::Expression {
                true_branch,
                false_branch,
                ..
            } => {
                // Branches re-split under the inherited weight spec.
                validate_forest(true_branch, weight)?;
                validate_forest(false_branch, weight)?;
            }
            Task::Instructions { weight, tasks } => validate_forest(tasks, weight)?,
        }
    }
    Ok(())
}

fn collect_requirements(tasks: &[Task], out: &mut Requirements) {
    for task in tasks {
        match task {
            Task::Buy { asset } => {
                if !out.assets.iter().any(|existing| existing == asset) {
                    out.assets.push(asset.clone());
                }
            }
            Task::Expression {
                conditions,
                true_branch,
                false_branch,
            } => {
                collect_operand(&conditions.condition1, out);
                collect_operand(&conditions.condition2, out);
                collect_requirements(true_branch, out);
                collect_requirements(false_branch, out);
            }
            Task::Instructions { tasks, .. } => collect_requirements(tasks, out),
        }
    }
}

fn collect_operand(operand: &Operand, out: &mut Requirements) {
    if let Operand::Indicator {
        function,
        period,
        source,
    } = operand
    {
        let column = indicator_column(function, *period);
        let duplicate = out.indicators.iter().any(|existing| {
            existing.source.identifier() == source.identifier() && existing.column() == column
        });
        if !duplicate {
            out.indicators.push(IndicatorRequirement {
                source: source.clone(),
                function: function.clone(),
                period: *period,
            });
        }
    }
}
