//! Rebalance scheduling over a trading-day calendar.
//!
//! The calendar itself (the canonical list of market-open dates) comes from a
//! [`CalendarPort`](crate::ports::calendar_port::CalendarPort) adapter; this
//! module only derives which of those days mandate re-evaluation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a calendar-triggered strategy re-evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl Frequency {
    /// Months whose first day anchors a rebalance period, for the
    /// period-based frequencies.
    fn anchor_months(self) -> &'static [u32] {
        match self {
            Frequency::Monthly => &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            Frequency::Quarterly => &[1, 4, 7, 10],
            Frequency::Annually => &[1],
            Frequency::Daily | Frequency::Weekly => &[],
        }
    }
}

/// The ordered subsequence of `trading_days` on which re-evaluation must
/// occur.
///
/// The first trading day is always a trigger: it is where the initial
/// position is struck. After that, a weekly trigger is any day whose weekday
/// index drops below the previous trading day's (the first trading day of a
/// new calendar week), and a period trigger is the first trading day on or
/// after a period anchor (`MM-01` instantiated in the day's own year) that no
/// earlier trading day already covered.
pub fn trigger_dates(trading_days: &[NaiveDate], frequency: Frequency) -> Vec<NaiveDate> {
    match frequency {
        Frequency::Daily => trading_days.to_vec(),
        Frequency::Weekly => weekly_triggers(trading_days),
        Frequency::Monthly | Frequency::Quarterly | Frequency::Annually => {
            anchored_triggers(trading_days, frequency.anchor_months())
        }
    }
}

fn weekly_triggers(trading_days: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut triggers = Vec::new();
    for (index, &day) in trading_days.iter().enumerate() {
        if index == 0 {
            triggers.push(day);
            continue;
        }
        let previous = trading_days[index - 1];
        if day.weekday().num_days_from_monday() < previous.weekday().num_days_from_monday() {
            triggers.push(day);
        }
    }
    triggers
}

fn anchored_triggers(trading_days: &[NaiveDate], anchor_months: &[u32]) -> Vec<NaiveDate> {
    let mut triggers = Vec::new();
    for (index, &day) in trading_days.iter().enumerate() {
        if index == 0 {
            triggers.push(day);
            continue;
        }
        let previous = trading_days[index - 1];
        let crossed = anchor_months.iter().any(|&month| {
            NaiveDate::from_ymd_opt(day.year(), month, 1)
                .map(|anchor| previous < anchor && anchor <= day)
                .unwrap_or(false)
        });
        if crossed {
            triggers.push(day);
        }
    }
    triggers
}
