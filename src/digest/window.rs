//! Digest time windows.
//!
//! Windows are whole UTC calendar days, half-open at the end:
//! daily `[d, d+1)`, weekly `[end-6, end+1)`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestKind {
    Daily,
    Weekly,
}

/// Inclusive range of calendar days covered by a digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestWindow {
    pub kind: DigestKind,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl DigestWindow {
    pub fn daily(date: NaiveDate) -> Self {
        Self {
            kind: DigestKind::Daily,
            first_day: date,
            last_day: date,
        }
    }

    /// Seven days ending on (and including) `week_end`
    pub fn weekly(week_end: NaiveDate) -> Self {
        Self {
            kind: DigestKind::Weekly,
            first_day: week_end - Duration::days(6),
            last_day: week_end,
        }
    }

    /// Inclusive lower bound
    pub fn start(&self) -> DateTime<Utc> {
        midnight(self.first_day)
    }

    /// Exclusive upper bound
    pub fn end(&self) -> DateTime<Utc> {
        midnight(self.last_day + Duration::days(1))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at < self.end()
    }
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Most recent `week_end_day` on or before `today`
pub fn week_ending_on_or_before(today: NaiveDate, week_end_day: Weekday) -> NaiveDate {
    let back = (7 + today.weekday().num_days_from_monday() as i64
        - week_end_day.num_days_from_monday() as i64)
        % 7;
    today - Duration::days(back)
}
