//! Trading calendar adapters.
//!
//! [`WeekdayCalendar`] approximates a market calendar as Monday through
//! Friday with no holidays, which is enough for simulation over daily bars.
//! [`CsvCalendarAdapter`] reads an explicit list of market-open dates from a
//! one-column CSV, for runs that need exchange holidays respected.

use crate::domain::error::ArborError;
use crate::ports::calendar_port::CalendarPort;
use chrono::{Datelike, NaiveDate};
use std::fs;
use std::path::PathBuf;

pub struct WeekdayCalendar;

impl CalendarPort for WeekdayCalendar {
    fn trading_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, ArborError> {
        if start > end {
            return Err(ArborError::Calendar {
                reason: format!("start {start} is after end {end}"),
            });
        }
        let mut days = Vec::new();
        let mut day = start;
        while day <= end {
            if day.weekday().num_days_from_monday() < 5 {
                days.push(day);
            }
            day = day.succ_opt().ok_or_else(|| ArborError::Calendar {
                reason: format!("date overflow past {day}"),
            })?;
        }
        Ok(days)
    }
}

/// Calendar backed by a CSV of market-open dates, one `YYYY-MM-DD` per row
/// under a `date` header.
pub struct CsvCalendarAdapter {
    path: PathBuf,
}

impl CsvCalendarAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CalendarPort for CsvCalendarAdapter {
    fn trading_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, ArborError> {
        if start > end {
            return Err(ArborError::Calendar {
                reason: format!("start {start} is after end {end}"),
            });
        }
        let content = fs::read_to_string(&self.path).map_err(|e| ArborError::Calendar {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut days = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| ArborError::Calendar {
                reason: format!("CSV parse error: {e}"),
            })?;
            let date_str = record.get(0).unwrap_or_default();
            let date =
                NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                    ArborError::Calendar {
                        reason: format!("invalid date {date_str:?}: {e}"),
                    }
                })?;
            if start <= date && date <= end {
                days.push(date);
            }
        }
        days.sort_unstable();
        days.dedup();
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekday_calendar_skips_weekends() {
        // 2024-01-01 is a Monday; the 6th and 7th are the weekend.
        let days = WeekdayCalendar
            .trading_days(date(2024, 1, 1), date(2024, 1, 8))
            .unwrap();
        assert_eq!(
            days,
            vec![
                date(2024, 1, 1),
                date(2024, 1, 2),
                date(2024, 1, 3),
                date(2024, 1, 4),
                date(2024, 1, 5),
                date(2024, 1, 8),
            ]
        );
    }

    #[test]
    fn weekday_calendar_rejects_reversed_range() {
        let result = WeekdayCalendar.trading_days(date(2024, 1, 8), date(2024, 1, 1));
        assert!(matches!(result, Err(ArborError::Calendar { .. })));
    }

    #[test]
    fn csv_calendar_filters_sorts_and_dedupes() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "date\n2024-01-03\n2024-01-02\n2024-01-02\n2023-12-29\n2024-02-01\n"
        )
        .unwrap();

        let adapter = CsvCalendarAdapter::new(file.path().to_path_buf());
        let days = adapter
            .trading_days(date(2024, 1, 1), date(2024, 1, 31))
            .unwrap();
        assert_eq!(days, vec![date(2024, 1, 2), date(2024, 1, 3)]);
    }

    #[test]
    fn csv_calendar_missing_file_is_an_error() {
        let adapter = CsvCalendarAdapter::new(PathBuf::from("/nonexistent/calendar.csv"));
        let result = adapter.trading_days(date(2024, 1, 1), date(2024, 1, 31));
        assert!(matches!(result, Err(ArborError::Calendar { .. })));
    }
}
