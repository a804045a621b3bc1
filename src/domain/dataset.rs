//! In-memory price/indicator dataset.
//!
//! A [`Series`] is a date-indexed table of named f64 columns: the `"open"`
//! price column plus one column per indicator (named `"<function> <period>"`).
//! Cells may hold `NaN` where an indicator is not yet defined, e.g. inside a
//! moving average's warm-up window. A [`Dataset`] maps series identifiers to
//! their tables and is read-only for the duration of a simulation run.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::error::ArborError;
use crate::domain::strategy::Strategy;
use crate::ports::data_port::DataPort;

/// Column holding the tradeable price used for striking quantities and
/// marking to market.
pub const PRICE_COLUMN: &str = "open";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    dates: Vec<NaiveDate>,
    index: HashMap<NaiveDate, usize>,
    columns: HashMap<String, Vec<f64>>,
}

impl Series {
    /// Builds a series from per-row values. Rows are sorted by date; every row
    /// must carry one value per column.
    pub fn from_rows(
        column_names: Vec<String>,
        mut rows: Vec<(NaiveDate, Vec<f64>)>,
    ) -> Result<Self, ArborError> {
        rows.sort_by_key(|(date, _)| *date);

        let mut dates = Vec::with_capacity(rows.len());
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); column_names.len()];

        for (date, values) in rows {
            if values.len() != column_names.len() {
                return Err(ArborError::Data {
                    identifier: date.to_string(),
                    reason: format!(
                        "row has {} values for {} columns",
                        values.len(),
                        column_names.len()
                    ),
                });
            }
            dates.push(date);
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }

        let index = dates
            .iter()
            .enumerate()
            .map(|(position, date)| (*date, position))
            .collect();

        Ok(Series {
            dates,
            index,
            columns: column_names.into_iter().zip(columns).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Whether the series has a row for `date` at all.
    pub fn has_date(&self, date: NaiveDate) -> bool {
        self.index.contains_key(&date)
    }

    /// The value in `column` on `date`. `None` when the row or the column is
    /// absent; the value itself may be `NaN`.
    pub fn value_at(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let position = *self.index.get(&date)?;
        self.columns.get(column)?.get(position).copied()
    }

    /// First date on which `column` holds a defined (non-`NaN`) value.
    pub fn first_date_where_defined(&self, column: &str) -> Option<NaiveDate> {
        let values = self.columns.get(column)?;
        values
            .iter()
            .position(|value| !value.is_nan())
            .map(|position| self.dates[position])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    series: HashMap<String, Series>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, series: Series) {
        self.series.insert(identifier.into(), series);
    }

    /// `None` covers both "never fetched" and "provider had nothing".
    pub fn get(&self, identifier: &str) -> Option<&Series> {
        self.series.get(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Fetches every series the strategy needs (buy assets, operand sources,
    /// benchmarks), each once. Identifiers the port has no data for are left
    /// absent; the evaluator and error tracker report them from there.
    pub fn assemble(strategy: &Strategy, port: &dyn DataPort) -> Result<Self, ArborError> {
        let mut dataset = Dataset::new();
        for identifier in strategy.identifiers() {
            match port.fetch_series(&identifier)? {
                Some(series) => {
                    dataset.insert(identifier, series);
                }
                None => {
                    log::warn!("no data for {identifier}");
                }
            }
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_series() -> Series {
        Series::from_rows(
            vec!["open".into(), "sma 2".into()],
            vec![
                (date(2024, 1, 3), vec![102.0, 101.0]),
                (date(2024, 1, 1), vec![100.0, f64::NAN]),
                (date(2024, 1, 2), vec![101.0, f64::NAN]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn from_rows_sorts_by_date() {
        let series = sample_series();
        assert_eq!(series.len(), 3);
        assert_eq!(series.first_date(), Some(date(2024, 1, 1)));
        assert_eq!(series.last_date(), Some(date(2024, 1, 3)));
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let result = Series::from_rows(
            vec!["open".into(), "sma 2".into()],
            vec![(date(2024, 1, 1), vec![100.0])],
        );
        assert!(matches!(result, Err(ArborError::Data { .. })));
    }

    #[test]
    fn value_at_returns_cell() {
        let series = sample_series();
        assert_eq!(series.value_at(date(2024, 1, 2), "open"), Some(101.0));
        assert_eq!(series.value_at(date(2024, 1, 3), "sma 2"), Some(101.0));
    }

    #[test]
    fn value_at_missing_row_or_column() {
        let series = sample_series();
        assert_eq!(series.value_at(date(2024, 1, 4), "open"), None);
        assert_eq!(series.value_at(date(2024, 1, 1), "rsi 14"), None);
    }

    #[test]
    fn value_at_preserves_nan() {
        let series = sample_series();
        let value = series.value_at(date(2024, 1, 1), "sma 2").unwrap();
        assert!(value.is_nan());
    }

    #[test]
    fn has_date_checks_row_presence() {
        let series = sample_series();
        assert!(series.has_date(date(2024, 1, 1)));
        assert!(!series.has_date(date(2024, 1, 4)));
    }

    #[test]
    fn first_date_where_defined_skips_nan() {
        let series = sample_series();
        assert_eq!(
            series.first_date_where_defined("sma 2"),
            Some(date(2024, 1, 3))
        );
        assert_eq!(
            series.first_date_where_defined("open"),
            Some(date(2024, 1, 1))
        );
        assert_eq!(series.first_date_where_defined("missing"), None);
    }

    #[test]
    fn first_date_where_defined_all_nan() {
        let series = Series::from_rows(
            vec!["sma 5".into()],
            vec![
                (date(2024, 1, 1), vec![f64::NAN]),
                (date(2024, 1, 2), vec![f64::NAN]),
            ],
        )
        .unwrap();
        assert_eq!(series.first_date_where_defined("sma 5"), None);
    }

    #[test]
    fn dataset_get() {
        let mut dataset = Dataset::new();
        dataset.insert("AAPL", sample_series());
        assert!(dataset.get("AAPL").is_some());
        assert!(dataset.get("MSFT").is_none());
    }
}
