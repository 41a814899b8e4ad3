//! Reporting periods and the time windows they cover.
//!
//! All dates are calendar days in UTC. Weeks start on Monday.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Granularity a metric is scored over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 3] = [PeriodType::Daily, PeriodType::Weekly, PeriodType::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    /// Medals are only handed out for weekly and monthly boards.
    pub fn awards_medals(&self) -> bool {
        !matches!(self, PeriodType::Daily)
    }

    /// The period of this type containing `date`.
    pub fn bounds_for(&self, date: NaiveDate) -> Period {
        match self {
            PeriodType::Daily => Period {
                period_type: *self,
                start: date,
                end: date,
            },
            PeriodType::Weekly => {
                let start = date - Duration::days(date.weekday().num_days_from_monday() as i64);
                Period {
                    period_type: *self,
                    start,
                    end: start + Duration::days(6),
                }
            }
            PeriodType::Monthly => {
                let start = date.with_day(1).unwrap_or(date);
                Period {
                    period_type: *self,
                    start,
                    end: last_day_of_month(start),
                }
            }
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(PeriodType::Daily),
            "weekly" => Ok(PeriodType::Weekly),
            "monthly" => Ok(PeriodType::Monthly),
            other => Err(EngineError::Validation(format!(
                "unknown period type '{other}'"
            ))),
        }
    }
}

/// A concrete, inclusive span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub period_type: PeriodType,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// The period immediately before this one.
    pub fn previous(&self) -> Period {
        self.period_type.bounds_for(self.start - Duration::days(1))
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }

    /// Monday to Friday days inside the period.
    pub fn working_days(&self) -> i32 {
        self.range().working_days()
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Half-open UTC instant window `[start 00:00, end + 1 day 00:00)`.
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            from: start_of_day(self.start),
            until: start_of_day(self.end + Duration::days(1)),
        }
    }

    pub fn working_days(&self) -> i32 {
        self.start
            .iter_days()
            .take_while(|day| *day <= self.end)
            .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as i32
    }
}

/// Half-open instant window used to filter activity facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// The `hours` leading up to `now`.
    pub fn trailing_hours(now: DateTime<Utc>, hours: i64) -> Self {
        Self {
            from: now - Duration::hours(hours),
            until: now,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant < self.until
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| next - Duration::days(1))
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekly_bounds_start_on_monday() {
        // 2026-03-05 is a Thursday
        let period = PeriodType::Weekly.bounds_for(date(2026, 3, 5));
        assert_eq!(period.start, date(2026, 3, 2));
        assert_eq!(period.end, date(2026, 3, 8));
    }

    #[test]
    fn test_monthly_bounds_handle_year_end_and_leap_years() {
        let december = PeriodType::Monthly.bounds_for(date(2025, 12, 17));
        assert_eq!(december.start, date(2025, 12, 1));
        assert_eq!(december.end, date(2025, 12, 31));

        let february = PeriodType::Monthly.bounds_for(date(2028, 2, 10));
        assert_eq!(february.end, date(2028, 2, 29));
    }

    #[test]
    fn test_previous_period() {
        let march = PeriodType::Monthly.bounds_for(date(2026, 3, 15));
        assert_eq!(march.previous().start, date(2026, 2, 1));

        let week = PeriodType::Weekly.bounds_for(date(2026, 3, 2));
        assert_eq!(week.previous().start, date(2026, 2, 23));
    }

    #[test]
    fn test_working_days_skip_weekends() {
        // March 2026: 22 weekdays
        assert_eq!(PeriodType::Monthly.bounds_for(date(2026, 3, 1)).working_days(), 22);
        assert_eq!(PeriodType::Weekly.bounds_for(date(2026, 3, 4)).working_days(), 5);
    }

    #[test]
    fn test_window_is_half_open() {
        let window = DateRange::day(date(2026, 3, 2)).window();
        assert!(window.contains(start_of_day(date(2026, 3, 2))));
        assert!(!window.contains(start_of_day(date(2026, 3, 3))));
    }

    #[test]
    fn test_period_type_parsing() {
        assert_eq!("weekly".parse::<PeriodType>().unwrap(), PeriodType::Weekly);
        assert!("yearly".parse::<PeriodType>().is_err());
        assert!(!PeriodType::Daily.awards_medals());
        assert!(PeriodType::Monthly.awards_medals());
    }
}
