//! Data-availability diagnostics.
//!
//! A simulation that never trades produces an empty record and no metrics;
//! the scan here is the explanation surface. It flattens the strategy tree
//! into its data requirements and checks each against the dataset at a
//! reference date (normally the first trading day), producing deduplicated
//! human-readable messages. The scan runs regardless of simulation outcome.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::dataset::{Dataset, PRICE_COLUMN};
use crate::domain::strategy::Strategy;

/// Availability issues bucketed by what kind of data is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueReport {
    /// Price data problems for assets named by `buy` tasks or asset operands.
    pub asset_errors: Vec<String>,
    /// Problems with economic data series named by series operands.
    pub series_errors: Vec<String>,
    /// Problems with indicator columns, keyed by `"<function> <period>"`.
    pub indicator_errors: Vec<String>,
}

impl IssueReport {
    pub fn is_empty(&self) -> bool {
        self.asset_errors.is_empty()
            && self.series_errors.is_empty()
            && self.indicator_errors.is_empty()
    }

    fn push_asset(&mut self, message: String) {
        push_unique(&mut self.asset_errors, message);
    }

    fn push_series(&mut self, message: String) {
        push_unique(&mut self.series_errors, message);
    }

    fn push_indicator(&mut self, message: String) {
        push_unique(&mut self.indicator_errors, message);
    }
}

fn push_unique(bucket: &mut Vec<String>, message: String) {
    if !bucket.contains(&message) {
        bucket.push(message);
    }
}

fn unavailable(subject: &str, until: Option<NaiveDate>) -> String {
    match until {
        Some(date) => format!("{subject} not available until {date}."),
        None => format!("{subject} not available."),
    }
}

pub struct ErrorTracker;

impl ErrorTracker {
    /// One pass over the strategy's requirements against the dataset.
    ///
    /// For each required asset, series, and indicator column: a missing
    /// series yields an undated message; a series that exists but has no
    /// defined value on `reference_date` yields an "until <date>" message
    /// pointing at the first defined value, or an undated one when the
    /// column never becomes defined. With no reference date (an empty
    /// trading calendar) only missing series are reported.
    pub fn scan(
        strategy: &Strategy,
        dataset: &Dataset,
        reference_date: Option<NaiveDate>,
    ) -> IssueReport {
        let mut report = IssueReport::default();
        let requirements = strategy.requirements();

        for asset in &requirements.assets {
            if let Some(message) = check_column(dataset, asset, PRICE_COLUMN, reference_date) {
                report.push_asset(message);
            }
        }

        for indicator in &requirements.indicators {
            let identifier = indicator.source.identifier();
            match dataset.get(identifier) {
                None => {
                    let message = unavailable(identifier, None);
                    if indicator.source.is_series() {
                        report.push_series(message);
                    } else {
                        report.push_asset(message);
                    }
                }
                Some(series) => {
                    let column = indicator.column();
                    let defined_at_reference = reference_date
                        .map(|date| is_defined(series.value_at(date, &column)))
                        .unwrap_or(true);
                    if !defined_at_reference {
                        let subject = format!("{identifier} {column}");
                        report.push_indicator(unavailable(
                            &subject,
                            series.first_date_where_defined(&column),
                        ));
                    }
                }
            }
        }

        report
    }
}

/// Undated message for a missing series, dated message for a series whose
/// `column` is not yet defined on the reference date, `None` when available.
fn check_column(
    dataset: &Dataset,
    identifier: &str,
    column: &str,
    reference_date: Option<NaiveDate>,
) -> Option<String> {
    let series = match dataset.get(identifier) {
        None => return Some(unavailable(identifier, None)),
        Some(series) => series,
    };
    let date = reference_date?;
    if is_defined(series.value_at(date, column)) {
        return None;
    }
    Some(unavailable(
        identifier,
        series.first_date_where_defined(column),
    ))
}

fn is_defined(value: Option<f64>) -> bool {
    matches!(value, Some(v) if !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::Frequency;
    use crate::domain::dataset::Series;
    use crate::domain::strategy::{
        Comparison, Conditions, Operand, SeriesRef, Task, WeightSpec,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn strategy_with(algorithm: Task) -> Strategy {
        Strategy {
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            name: "test".into(),
            benchmarks: vec![],
            trading_frequency: Frequency::Daily,
            trading_threshold: 0.0,
            algorithm,
        }
    }

    fn buy(asset: &str) -> Task {
        Task::Buy {
            asset: asset.into(),
        }
    }

    fn root(tasks: Vec<Task>) -> Task {
        Task::Instructions {
            weight: WeightSpec::Equal,
            tasks,
        }
    }

    fn expression(condition1: Operand, condition2: Operand) -> Task {
        Task::Expression {
            conditions: Conditions {
                operator: Comparison::Gt,
                condition1,
                condition2,
            },
            true_branch: vec![buy("AAPL")],
            false_branch: vec![buy("AAPL")],
        }
    }

    fn open_series(rows: Vec<(NaiveDate, f64)>) -> Series {
        Series::from_rows(
            vec![PRICE_COLUMN.into()],
            rows.into_iter().map(|(d, v)| (d, vec![v])).collect(),
        )
        .unwrap()
    }

    #[test]
    fn clean_dataset_yields_empty_report() {
        let mut dataset = Dataset::new();
        dataset.insert("AAPL", open_series(vec![(date(2024, 1, 1), 100.0)]));
        let strategy = strategy_with(root(vec![buy("AAPL")]));
        let report = ErrorTracker::scan(&strategy, &dataset, Some(date(2024, 1, 1)));
        assert!(report.is_empty());
    }

    #[test]
    fn missing_asset_reports_undated() {
        let dataset = Dataset::new();
        let strategy = strategy_with(root(vec![buy("GHOST")]));
        let report = ErrorTracker::scan(&strategy, &dataset, Some(date(2024, 1, 1)));
        assert_eq!(report.asset_errors, vec!["GHOST not available."]);
    }

    #[test]
    fn late_starting_asset_reports_until_date() {
        let mut dataset = Dataset::new();
        dataset.insert("AAPL", open_series(vec![(date(2024, 3, 4), 100.0)]));
        let strategy = strategy_with(root(vec![buy("AAPL")]));
        let report = ErrorTracker::scan(&strategy, &dataset, Some(date(2024, 1, 1)));
        assert_eq!(
            report.asset_errors,
            vec!["AAPL not available until 2024-03-04."]
        );
    }

    #[test]
    fn indicator_warmup_reports_until_first_defined() {
        let series = Series::from_rows(
            vec![PRICE_COLUMN.into(), "sma 2".into()],
            vec![
                (date(2024, 1, 1), vec![100.0, f64::NAN]),
                (date(2024, 1, 2), vec![101.0, 100.5]),
            ],
        )
        .unwrap();
        let mut dataset = Dataset::new();
        dataset.insert("AAPL", series);
        dataset.insert("MSFT", open_series(vec![(date(2024, 1, 1), 50.0)]));

        let strategy = strategy_with(root(vec![expression(
            Operand::Indicator {
                function: "sma".into(),
                period: 2,
                source: SeriesRef::Asset("AAPL".into()),
            },
            Operand::Constant { fixed_value: 0.0 },
        )]));
        let report = ErrorTracker::scan(&strategy, &dataset, Some(date(2024, 1, 1)));
        assert_eq!(
            report.indicator_errors,
            vec!["AAPL sma 2 not available until 2024-01-02."]
        );
    }

    #[test]
    fn never_defined_indicator_reports_undated() {
        let mut dataset = Dataset::new();
        dataset.insert("AAPL", open_series(vec![(date(2024, 1, 1), 100.0)]));

        let strategy = strategy_with(root(vec![expression(
            Operand::Indicator {
                function: "sma".into(),
                period: 200,
                source: SeriesRef::Asset("AAPL".into()),
            },
            Operand::Constant { fixed_value: 0.0 },
        )]));
        let report = ErrorTracker::scan(&strategy, &dataset, Some(date(2024, 1, 1)));
        assert_eq!(
            report.indicator_errors,
            vec!["AAPL sma 200 not available."]
        );
    }

    #[test]
    fn missing_series_operand_goes_to_series_bucket() {
        let mut dataset = Dataset::new();
        dataset.insert("AAPL", open_series(vec![(date(2024, 1, 1), 100.0)]));

        let strategy = strategy_with(root(vec![expression(
            Operand::Indicator {
                function: "sma".into(),
                period: 10,
                source: SeriesRef::Series("UNRATE".into()),
            },
            Operand::Constant { fixed_value: 4.0 },
        )]));
        let report = ErrorTracker::scan(&strategy, &dataset, Some(date(2024, 1, 1)));
        assert_eq!(report.series_errors, vec!["UNRATE not available."]);
        assert!(report.asset_errors.is_empty());
    }

    #[test]
    fn duplicate_requirements_report_once() {
        let dataset = Dataset::new();
        let strategy = strategy_with(root(vec![buy("GHOST"), buy("GHOST")]));
        let report = ErrorTracker::scan(&strategy, &dataset, Some(date(2024, 1, 1)));
        assert_eq!(report.asset_errors.len(), 1);
    }

    #[test]
    fn no_reference_date_reports_only_missing_series() {
        let mut dataset = Dataset::new();
        dataset.insert("AAPL", open_series(vec![(date(2024, 3, 4), 100.0)]));
        let strategy = strategy_with(root(vec![buy("AAPL"), buy("GHOST")]));
        let report = ErrorTracker::scan(&strategy, &dataset, None);
        assert_eq!(report.asset_errors, vec!["GHOST not available."]);
    }

    #[test]
    fn serializes_snake_case_buckets() {
        let report = IssueReport {
            asset_errors: vec!["GHOST not available.".into()],
            series_errors: vec![],
            indicator_errors: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["asset_errors"][0], "GHOST not available.");
        assert!(json["series_errors"].as_array().unwrap().is_empty());
    }
}
