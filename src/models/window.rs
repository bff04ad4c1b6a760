use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Named reporting period, resolved against the local wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Today,
    Month,
    Year,
}

impl Period {
    /// Unknown or missing selectors fall back to `today`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("month") => Period::Month,
            Some("year") => Period::Year,
            _ => Period::Today,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// Local start of the period containing `now`.
    pub fn start(&self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        let today = local_date(now, offset);
        local_midnight(self.floor(today), offset)
    }

    /// Local start of the period following the one containing `now`.
    pub fn next_start(&self, now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        let first = self.floor(local_date(now, offset));
        let next = match self {
            Period::Today => first + Duration::days(1),
            Period::Month => month_floor(first + Duration::days(32)),
            Period::Year => year_floor(first + Duration::days(366)),
        };
        local_midnight(next, offset)
    }

    /// From the start of the current period up to `now`.
    pub fn to_date(&self, now: DateTime<Utc>, offset: FixedOffset) -> TimeRange {
        TimeRange {
            start: self.start(now, offset),
            end: now,
        }
    }

    /// The whole calendar period immediately before the current one
    /// (yesterday, last month, last year).
    pub fn previous(&self, now: DateTime<Utc>, offset: FixedOffset) -> TimeRange {
        let current_first = self.floor(local_date(now, offset));
        let previous_first = self.floor(current_first - Duration::days(1));
        TimeRange::until_exclusive(
            local_midnight(previous_first, offset),
            local_midnight(current_first, offset),
        )
    }

    /// Elapsed and total duration of the current period at `now`.
    pub fn progress(&self, now: DateTime<Utc>, offset: FixedOffset) -> (Duration, Duration) {
        let start = self.start(now, offset);
        let next = self.next_start(now, offset);
        (now - start, next - start)
    }

    fn floor(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Today => date,
            Period::Month => month_floor(date),
            Period::Year => year_floor(date),
        }
    }
}

/// Inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Range ending one microsecond before `end`, the storage resolution.
    pub fn until_exclusive(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end - Duration::microseconds(1),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// A single calendar month in local time.
    pub fn calendar_month(year: i32, month: u32, offset: FixedOffset) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = month_floor(first + Duration::days(32));
        Some(Self::until_exclusive(
            local_midnight(first, offset),
            local_midnight(next, offset),
        ))
    }

    /// A single calendar year in local time.
    pub fn calendar_year(year: i32, offset: FixedOffset) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(Self::until_exclusive(
            local_midnight(first, offset),
            local_midnight(next, offset),
        ))
    }
}

/// The time scope of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Named(Period),
    Range(TimeRange),
}

impl Window {
    pub fn resolve(&self, now: DateTime<Utc>, offset: FixedOffset) -> TimeRange {
        match self {
            Window::Named(period) => period.to_date(now, offset),
            Window::Range(range) => *range,
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Window::Named(Period::Today)
    }
}

impl From<Period> for Window {
    fn from(period: Period) -> Self {
        Window::Named(period)
    }
}

impl From<TimeRange> for Window {
    fn from(range: TimeRange) -> Self {
        Window::Range(range)
    }
}

pub fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(offset.local_minus_utc() as i64);
    DateTime::<Utc>::from_naive_utc_and_offset(utc, Utc)
}

fn month_floor(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

fn year_floor(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.ordinal0() as i64)
}
