use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{Result, TatError};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Parse an IANA timezone identifier.
pub fn parse_timezone(tz_name: &str) -> Result<Tz> {
    tz_name
        .parse::<Tz>()
        .map_err(|_| TatError::UnknownTimezone(tz_name.to_string()))
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    parse_timezone(tz_name).is_ok()
}

/// Resolve a configured timezone name into a [`Tz`].
///
/// `"auto"` (or an empty string) selects the system timezone. Unrecognised
/// names fall back to UTC with a warning.
pub fn resolve_timezone(tz_name: &str) -> Tz {
    let name = match tz_name.trim() {
        "" | "auto" => get_system_timezone(),
        other => other.to_string(),
    };
    parse_timezone(&name).unwrap_or_else(|e| {
        warn!("{}, falling back to UTC", e);
        Tz::UTC
    })
}

// ── LocalCalendar ─────────────────────────────────────────────────────────────

/// Calendar arithmetic (day, week and month boundaries) in one timezone.
///
/// All inputs and outputs are UTC instants; only the boundaries are local.
/// Period ends are inclusive: one millisecond before the next period starts.
#[derive(Debug, Clone, Copy)]
pub struct LocalCalendar {
    tz: Tz,
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl LocalCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The local calendar date `t` falls on.
    pub fn local_date(&self, t: DateTime<Utc>) -> NaiveDate {
        t.with_timezone(&self.tz).date_naive()
    }

    /// First instant of the local `date`.
    ///
    /// Where a DST transition swallows midnight the first existing
    /// wall-clock hour is used.
    pub fn date_start(&self, date: NaiveDate) -> DateTime<Utc> {
        (0..3)
            .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
            .find_map(|naive| self.tz.from_local_datetime(&naive).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&NaiveDateTime::from(date)))
    }

    /// Last millisecond of the local `date`.
    ///
    /// The last representable date ends at [`DateTime::<Utc>::MAX_UTC`].
    pub fn date_end(&self, date: NaiveDate) -> DateTime<Utc> {
        match date.succ_opt() {
            Some(next) => self.date_start(next) - Duration::milliseconds(1),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn start_of_day(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        self.date_start(self.local_date(t))
    }

    pub fn end_of_day(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        self.date_end(self.local_date(t))
    }

    /// Local date of the week start on or before `date`.
    pub fn week_start_date(date: NaiveDate, week_start: Weekday) -> NaiveDate {
        let offset =
            (7 + date.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
        date.checked_sub_days(Days::new(u64::from(offset)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Local date of the last day of the week starting on `first`.
    pub fn week_end_date(first: NaiveDate) -> NaiveDate {
        first.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX)
    }

    pub fn start_of_week(&self, t: DateTime<Utc>, week_start: Weekday) -> DateTime<Utc> {
        self.date_start(Self::week_start_date(self.local_date(t), week_start))
    }

    pub fn end_of_week(&self, t: DateTime<Utc>, week_start: Weekday) -> DateTime<Utc> {
        let first = Self::week_start_date(self.local_date(t), week_start);
        self.date_end(Self::week_end_date(first))
    }

    /// First local date of the month containing `date`.
    pub fn month_start_date(date: NaiveDate) -> NaiveDate {
        date.with_day(1).unwrap_or(date)
    }

    /// Last local date of the month containing `date`.
    pub fn month_end_date(date: NaiveDate) -> NaiveDate {
        let (year, month) = if date.month() == 12 {
            (date.year() + 1, 1)
        } else {
            (date.year(), date.month() + 1)
        };
        // Only the final representable month has no successor.
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn start_of_month(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        self.date_start(Self::month_start_date(self.local_date(t)))
    }

    pub fn end_of_month(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        self.date_end(Self::month_end_date(self.local_date(t)))
    }

    /// Whether `a` and `b` fall in the same local calendar month.
    pub fn same_month(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        let (a, b) = (self.local_date(a), self.local_date(b));
        a.year() == b.year() && a.month() == b.month()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
