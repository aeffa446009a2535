//! Time buckets for trend views.
//!
//! A [`DateRange`] is split into ordered, contiguous, non-overlapping
//! [`TimeBucket`]s whose size depends on how long the range is.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Result, TatError};
use crate::time_utils::LocalCalendar;

// ── DateRange ─────────────────────────────────────────────────────────────────

/// An inclusive `[start, end]` range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a range, rejecting one that ends before it starts.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(TatError::InvalidRange(format!(
                "end {} is before start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Whole local days from the first day's start to the last day's end.
    pub fn from_dates(first: NaiveDate, last: NaiveDate, calendar: &LocalCalendar) -> Result<Self> {
        Self::new(calendar.date_start(first), calendar.date_end(last))
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

// ── Granularity ───────────────────────────────────────────────────────────────

/// Bucket size chosen for a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    Daily,
    /// Sunday-anchored weeks clipped to a single calendar month.
    WeeklyInMonth,
    /// Monday-anchored weeks.
    Weekly,
    Monthly,
}

impl Granularity {
    /// Pick the bucket size for `range`; `None` means "all time".
    ///
    /// Cut-offs: up to 1 day hourly, up to 7 days daily, up to 31 days
    /// inside one calendar month weekly-within-month, up to 365 days weekly,
    /// monthly beyond that.
    pub fn for_range(range: Option<&DateRange>, calendar: &LocalCalendar) -> Self {
        let Some(range) = range else {
            return Granularity::Weekly;
        };
        let span = range.span();
        if span <= Duration::days(1) {
            Granularity::Hourly
        } else if span <= Duration::days(7) {
            Granularity::Daily
        } else if span <= Duration::days(31) && calendar.same_month(range.start, range.end) {
            Granularity::WeeklyInMonth
        } else if span <= Duration::days(365) {
            Granularity::Weekly
        } else {
            Granularity::Monthly
        }
    }
}

// ── TimeBucket ────────────────────────────────────────────────────────────────

/// One interval of a bucketed range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    /// Inclusive: the last millisecond belonging to this bucket.
    pub end: DateTime<Utc>,
    /// Display label, e.g. `"Mar 12"` or `"Week 2"`.
    pub label: String,
    /// Stable join key, e.g. `"2024-03-12"` or `"2024-03-W2"`.
    pub key: String,
}

impl TimeBucket {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

// ── BucketPlanner ─────────────────────────────────────────────────────────────

/// Builds bucket sequences in a given local calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketPlanner {
    calendar: LocalCalendar,
}

impl BucketPlanner {
    pub fn new(calendar: LocalCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }

    /// Choose a granularity for `range` and build its buckets.
    pub fn plan(&self, range: &DateRange) -> (Granularity, Vec<TimeBucket>) {
        let granularity = Granularity::for_range(Some(range), &self.calendar);
        (granularity, self.build(range, granularity))
    }

    /// Build buckets of `granularity` covering `range`.
    ///
    /// Hourly, daily, weekly and monthly buckets cover whole calendar units,
    /// so the first and last bucket may extend past the range.
    /// Weekly-within-month buckets cover exactly the month of `range.start`.
    pub fn build(&self, range: &DateRange, granularity: Granularity) -> Vec<TimeBucket> {
        match granularity {
            Granularity::Hourly => self.hourly(range),
            Granularity::Daily => self.daily(range),
            Granularity::WeeklyInMonth => self.weekly_in_month(range),
            Granularity::Weekly => self.weekly(range),
            Granularity::Monthly => self.monthly(range),
        }
    }

    fn hourly(&self, range: &DateRange) -> Vec<TimeBucket> {
        let tz = self.calendar.timezone();
        let local = range.start.with_timezone(&tz);
        let floored = local
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(range.start);

        let mut buckets = Vec::new();
        let mut cursor = floored;
        while cursor <= range.end {
            let next = cursor.checked_add_signed(Duration::hours(1));
            buckets.push(TimeBucket {
                start: cursor,
                end: next.map_or(DateTime::<Utc>::MAX_UTC, |n| n - Duration::milliseconds(1)),
                label: cursor.with_timezone(&tz).format("%H:00").to_string(),
                key: cursor.format("%Y-%m-%dT%H:00Z").to_string(),
            });
            match next {
                Some(next) => cursor = next,
                None => break,
            }
        }
        buckets
    }

    fn daily(&self, range: &DateRange) -> Vec<TimeBucket> {
        let last = self.calendar.local_date(range.end);
        let mut day = self.calendar.local_date(range.start);
        let mut buckets = Vec::new();
        while day <= last {
            buckets.push(TimeBucket {
                start: self.calendar.date_start(day),
                end: self.calendar.date_end(day),
                label: day.format("%b %d").to_string(),
                key: day.format("%Y-%m-%d").to_string(),
            });
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        buckets
    }

    fn weekly_in_month(&self, range: &DateRange) -> Vec<TimeBucket> {
        let anchor = self.calendar.local_date(range.start);
        let month_first = LocalCalendar::month_start_date(anchor);
        let month_last = LocalCalendar::month_end_date(anchor);

        let mut buckets = Vec::new();
        let mut first = month_first;
        let mut number = 1;
        while first <= month_last {
            let saturday =
                LocalCalendar::week_end_date(LocalCalendar::week_start_date(first, Weekday::Sun));
            let last = saturday.min(month_last);
            buckets.push(TimeBucket {
                start: self.calendar.date_start(first),
                end: self.calendar.date_end(last),
                label: format!("Week {}", number),
                key: format!("{}-W{}", first.format("%Y-%m"), number),
            });
            match last.succ_opt() {
                Some(next) => first = next,
                None => break,
            }
            number += 1;
        }
        buckets
    }

    fn weekly(&self, range: &DateRange) -> Vec<TimeBucket> {
        let last = self.calendar.local_date(range.end);
        let mut monday =
            LocalCalendar::week_start_date(self.calendar.local_date(range.start), Weekday::Mon);
        let mut buckets = Vec::new();
        while monday <= last {
            buckets.push(self.week_bucket(monday));
            match LocalCalendar::week_end_date(monday).succ_opt() {
                Some(next) => monday = next,
                None => break,
            }
        }
        buckets
    }

    /// Monday-anchored weekly buckets for only the weeks that contain one of
    /// `instants`, in order.
    ///
    /// Unlike [`BucketPlanner::build`] this never materialises the weeks in
    /// between, so a far-off instant costs one bucket.
    pub fn weeks_containing<I>(&self, instants: I) -> Vec<TimeBucket>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let mondays: BTreeSet<NaiveDate> = instants
            .into_iter()
            .map(|t| LocalCalendar::week_start_date(self.calendar.local_date(t), Weekday::Mon))
            .collect();
        mondays.into_iter().map(|monday| self.week_bucket(monday)).collect()
    }

    fn week_bucket(&self, monday: NaiveDate) -> TimeBucket {
        let sunday = LocalCalendar::week_end_date(monday);
        TimeBucket {
            start: self.calendar.date_start(monday),
            end: self.calendar.date_end(sunday),
            label: format!("{} - {}", monday.format("%b %d"), sunday.format("%b %d")),
            key: monday.format("%G-W%V").to_string(),
        }
    }

    fn monthly(&self, range: &DateRange) -> Vec<TimeBucket> {
        let last = self.calendar.local_date(range.end);
        let mut first = LocalCalendar::month_start_date(self.calendar.local_date(range.start));
        let mut buckets = Vec::new();
        while first <= last {
            let month_last = LocalCalendar::month_end_date(first);
            buckets.push(TimeBucket {
                start: self.calendar.date_start(first),
                end: self.calendar.date_end(month_last),
                label: first.format("%b %Y").to_string(),
                key: first.format("%Y-%m").to_string(),
            });
            match month_last.succ_opt() {
                Some(next) => first = next,
                None => break,
            }
        }
        buckets
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
