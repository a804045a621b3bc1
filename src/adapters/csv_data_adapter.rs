//! CSV file data adapter.
//!
//! One file per identifier, `<base>/<identifier>.csv`. The header names the
//! columns: `date` first, then `open` and any indicator columns (e.g.
//! `sma 20`). Empty cells and `nan` parse to `NaN`, which is how indicator
//! warm-up windows are represented on disk.

use crate::domain::dataset::Series;
use crate::domain::error::ArborError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvDataAdapter {
    base_path: PathBuf,
}

impl CsvDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, identifier: &str) -> PathBuf {
        self.base_path.join(format!("{identifier}.csv"))
    }
}

fn parse_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    trimmed.parse().ok()
}

impl DataPort for CsvDataAdapter {
    fn fetch_series(&self, identifier: &str) -> Result<Option<Series>, ArborError> {
        let path = self.csv_path(identifier);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ArborError::Data {
                    identifier: identifier.to_string(),
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| ArborError::Data {
                identifier: identifier.to_string(),
                reason: format!("CSV header error: {e}"),
            })?
            .clone();
        if headers.get(0).map(str::trim) != Some("date") {
            return Err(ArborError::Data {
                identifier: identifier.to_string(),
                reason: "first CSV column must be 'date'".into(),
            });
        }
        let column_names: Vec<String> = headers
            .iter()
            .skip(1)
            .map(|name| name.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| ArborError::Data {
                identifier: identifier.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let date_str = record.get(0).unwrap_or_default();
            let date =
                NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| ArborError::Data {
                    identifier: identifier.to_string(),
                    reason: format!("invalid date {date_str:?}: {e}"),
                })?;

            let mut values = Vec::with_capacity(column_names.len());
            for (position, name) in column_names.iter().enumerate() {
                let raw = record.get(position + 1).unwrap_or_default();
                let value = parse_cell(raw).ok_or_else(|| ArborError::Data {
                    identifier: identifier.to_string(),
                    reason: format!("invalid value {raw:?} for {name} on {date}"),
                })?;
                values.push(value);
            }
            rows.push((date, values));
        }

        Series::from_rows(column_names, rows).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::PRICE_COLUMN;
    use std::io::Write;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_csv(dir: &TempDir, identifier: &str, content: &str) {
        let mut file = fs::File::create(dir.path().join(format!("{identifier}.csv"))).unwrap();
        write!(file, "{content}").unwrap();
    }

    #[test]
    fn fetches_price_and_indicator_columns() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "AAPL",
            "date,open,sma 2\n2024-01-01,100.0,\n2024-01-02,101.0,100.5\n",
        );

        let adapter = CsvDataAdapter::new(dir.path().to_path_buf());
        let series = adapter.fetch_series("AAPL").unwrap().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.value_at(date(2024, 1, 2), PRICE_COLUMN),
            Some(101.0)
        );
        assert!(series
            .value_at(date(2024, 1, 1), "sma 2")
            .unwrap()
            .is_nan());
        assert_eq!(series.value_at(date(2024, 1, 2), "sma 2"), Some(100.5));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDataAdapter::new(dir.path().to_path_buf());
        assert!(adapter.fetch_series("GHOST").unwrap().is_none());
    }

    #[test]
    fn nan_spelling_parses_as_nan() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "SPY", "date,open,rsi 14\n2024-01-01,470.0,NaN\n");

        let adapter = CsvDataAdapter::new(dir.path().to_path_buf());
        let series = adapter.fetch_series("SPY").unwrap().unwrap();
        assert!(series
            .value_at(date(2024, 1, 1), "rsi 14")
            .unwrap()
            .is_nan());
    }

    #[test]
    fn out_of_order_rows_are_sorted() {
        let dir = TempDir::new().unwrap();
        write_csv(
            &dir,
            "MSFT",
            "date,open\n2024-01-03,103.0\n2024-01-01,101.0\n2024-01-02,102.0\n",
        );

        let adapter = CsvDataAdapter::new(dir.path().to_path_buf());
        let series = adapter.fetch_series("MSFT").unwrap().unwrap();
        assert_eq!(series.first_date(), Some(date(2024, 1, 1)));
        assert_eq!(series.last_date(), Some(date(2024, 1, 3)));
    }

    #[test]
    fn rejects_bad_date() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "BAD", "date,open\n01/02/2024,100.0\n");

        let adapter = CsvDataAdapter::new(dir.path().to_path_buf());
        let err = adapter.fetch_series("BAD").unwrap_err();
        assert!(matches!(err, ArborError::Data { identifier, .. } if identifier == "BAD"));
    }

    #[test]
    fn rejects_non_numeric_value() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "BAD", "date,open\n2024-01-01,oops\n");

        let adapter = CsvDataAdapter::new(dir.path().to_path_buf());
        assert!(adapter.fetch_series("BAD").is_err());
    }

    #[test]
    fn rejects_missing_date_header() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "BAD", "open,close\n100.0,101.0\n");

        let adapter = CsvDataAdapter::new(dir.path().to_path_buf());
        assert!(adapter.fetch_series("BAD").is_err());
    }
}
