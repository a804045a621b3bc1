//! Trading calendar port trait.

use chrono::NaiveDate;

use crate::domain::error::ArborError;

pub trait CalendarPort {
    /// Ordered market-open dates in `[start, end]`, inclusive.
    fn trading_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, ArborError>;
}
