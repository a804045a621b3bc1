#![allow(dead_code)]

use arbor::domain::dataset::{Series, PRICE_COLUMN};
use arbor::domain::error::ArborError;
use arbor::ports::data_port::DataPort;
use arbor::ports::metrics_port::{MetricsPort, MetricsRequest};
use chrono::NaiveDate;
use std::collections::HashMap;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A price-only series with one row per `(date, open)` pair.
pub fn open_series(rows: Vec<(NaiveDate, f64)>) -> Series {
    Series::from_rows(
        vec![PRICE_COLUMN.into()],
        rows.into_iter().map(|(d, v)| (d, vec![v])).collect(),
    )
    .unwrap()
}

pub fn constant_series(dates: &[NaiveDate], price: f64) -> Series {
    open_series(dates.iter().map(|&d| (d, price)).collect())
}

pub struct MockDataPort {
    pub data: HashMap<String, Series>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, identifier: &str, series: Series) -> Self {
        self.data.insert(identifier.to_string(), series);
        self
    }

    pub fn with_error(mut self, identifier: &str, reason: &str) -> Self {
        self.errors
            .insert(identifier.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(&self, identifier: &str) -> Result<Option<Series>, ArborError> {
        if let Some(reason) = self.errors.get(identifier) {
            return Err(ArborError::Data {
                identifier: identifier.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(identifier).cloned())
    }
}

/// Metrics port that returns a fixed payload and records what it was asked.
pub struct StubMetricsPort {
    pub payload: serde_json::Value,
}

impl StubMetricsPort {
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }
}

impl MetricsPort for StubMetricsPort {
    fn compute(&self, request: &MetricsRequest<'_>) -> serde_json::Value {
        serde_json::json!({
            "payload": self.payload,
            "first_date": request.first_date.to_string(),
            "last_date": request.last_date.to_string(),
        })
    }
}
