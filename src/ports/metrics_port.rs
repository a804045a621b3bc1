//! Performance metrics port trait.
//!
//! Metrics computation is an external concern. The simulator's only
//! obligation is to hand over the value/weight history anchored at the first
//! and last recorded dates; whatever the port returns is embedded verbatim
//! in the backtest report.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Everything a metrics implementation gets to work with.
pub struct MetricsRequest<'a> {
    pub portfolio_values: &'a BTreeMap<NaiveDate, f64>,
    pub asset_weights: &'a BTreeMap<NaiveDate, HashMap<String, f64>>,
    pub benchmarks: &'a [String],
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

pub trait MetricsPort {
    fn compute(&self, request: &MetricsRequest<'_>) -> serde_json::Value;
}
