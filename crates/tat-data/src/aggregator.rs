//! Per-stage accumulation of turnaround durations over time buckets and
//! fixed reporting windows.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tat_core::calculations::{StageDurationCalculator, StageDurations};
use tat_core::models::{LifecycleRecord, Stage};
use tat_core::periods::{DateRange, TimeBucket};
use tat_core::time_utils::LocalCalendar;

// ── StageAccumulator ──────────────────────────────────────────────────────────

/// Running `(sum, count)` of non-zero durations for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageAccumulator {
    pub sum: u64,
    pub count: u32,
}

impl StageAccumulator {
    /// Add `minutes`; zero means "not computable" and is ignored.
    pub fn add(&mut self, minutes: u64) {
        if minutes > 0 {
            self.sum += minutes;
            self.count += 1;
        }
    }

    /// Mean minutes, or `0.0` when nothing was added.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum as f64 / f64::from(self.count)
    }
}

// ── BucketAccumulator ─────────────────────────────────────────────────────────

/// Per-stage accumulators for one bucket or window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketAccumulator {
    stages: [StageAccumulator; 5],
    total: StageAccumulator,
    samples: u32,
}

impl BucketAccumulator {
    /// Accumulate one record's resolved durations.
    pub fn add_durations(&mut self, durations: &StageDurations) {
        for (stage, minutes) in durations.iter() {
            self.stages[stage.index()].add(minutes);
        }
        self.total.add(durations.total);
        self.samples += 1;
    }

    pub fn stage(&self, stage: Stage) -> &StageAccumulator {
        &self.stages[stage.index()]
    }

    pub fn total(&self) -> &StageAccumulator {
        &self.total
    }

    /// Number of records that landed here, whether or not any stage was
    /// computable.
    pub fn samples(&self) -> u32 {
        self.samples
    }
}

/// A bucket together with what accumulated in it.
#[derive(Debug, Clone)]
pub struct BucketSummary {
    pub bucket: TimeBucket,
    pub accumulator: BucketAccumulator,
}

// ── Fixed windows ─────────────────────────────────────────────────────────────

/// The three fixed reporting windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Daily,
    Weekly,
    Monthly,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Daily, Window::Weekly, Window::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Daily => "daily",
            Window::Weekly => "weekly",
            Window::Monthly => "monthly",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Concrete instant ranges for the daily, weekly and monthly windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindows {
    pub daily: DateRange,
    pub weekly: DateRange,
    pub monthly: DateRange,
}

impl FixedWindows {
    /// Today, this Monday-start week and this calendar month around `now`.
    pub fn around(now: DateTime<Utc>, calendar: &LocalCalendar) -> Self {
        Self {
            daily: DateRange {
                start: calendar.start_of_day(now),
                end: calendar.end_of_day(now),
            },
            weekly: DateRange {
                start: calendar.start_of_week(now, Weekday::Mon),
                end: calendar.end_of_week(now, Weekday::Mon),
            },
            monthly: DateRange {
                start: calendar.start_of_month(now),
                end: calendar.end_of_month(now),
            },
        }
    }

    /// `range` widened to whole days, whole Monday-start weeks and whole
    /// calendar months respectively.
    pub fn widened(range: &DateRange, calendar: &LocalCalendar) -> Self {
        Self {
            daily: DateRange {
                start: calendar.start_of_day(range.start),
                end: calendar.end_of_day(range.end),
            },
            weekly: DateRange {
                start: calendar.start_of_week(range.start, Weekday::Mon),
                end: calendar.end_of_week(range.end, Weekday::Mon),
            },
            monthly: DateRange {
                start: calendar.start_of_month(range.start),
                end: calendar.end_of_month(range.end),
            },
        }
    }

    pub fn get(&self, window: Window) -> &DateRange {
        match window {
            Window::Daily => &self.daily,
            Window::Weekly => &self.weekly,
            Window::Monthly => &self.monthly,
        }
    }
}

/// One accumulator per fixed window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowAccumulators {
    windows: [BucketAccumulator; 3],
}

impl WindowAccumulators {
    pub fn get(&self, window: Window) -> &BucketAccumulator {
        &self.windows[window.index()]
    }
}

// ── TatAggregator ─────────────────────────────────────────────────────────────

/// Stateless helper that groups lifecycle records by time.
pub struct TatAggregator;

impl TatAggregator {
    /// Records eligible for aggregation: those that progressed past the
    /// request event.
    pub fn valid_records(records: &[LifecycleRecord]) -> Vec<&LifecycleRecord> {
        let valid: Vec<&LifecycleRecord> =
            records.iter().filter(|r| r.is_valid_sample()).collect();
        debug!(
            "{} of {} records are valid samples",
            valid.len(),
            records.len()
        );
        valid
    }

    /// Accumulate valid records into `buckets` by their request instant.
    ///
    /// `buckets` must be ordered and non-overlapping, as produced by
    /// [`tat_core::periods::BucketPlanner`]. Buckets that receive no record
    /// are dropped from the result.
    pub fn aggregate_buckets(
        records: &[LifecycleRecord],
        buckets: &[TimeBucket],
    ) -> Vec<BucketSummary> {
        let mut accumulators = vec![BucketAccumulator::default(); buckets.len()];

        for record in Self::valid_records(records) {
            let Some(instant) = record.instant_of_record() else {
                debug!("Record {}: no request instant, cannot place in a bucket", record.id);
                continue;
            };
            let Some(index) = Self::find_bucket(buckets, instant) else {
                debug!("Record {}: {} is outside every bucket", record.id, instant);
                continue;
            };
            accumulators[index].add_durations(&StageDurationCalculator::calculate(record));
        }

        buckets
            .iter()
            .zip(accumulators)
            .filter(|(_, acc)| acc.samples() > 0)
            .map(|(bucket, accumulator)| BucketSummary {
                bucket: bucket.clone(),
                accumulator,
            })
            .collect()
    }

    /// Accumulate valid records into each fixed window containing their
    /// request instant. A record may count toward several windows.
    pub fn aggregate_windows(
        records: &[LifecycleRecord],
        windows: &FixedWindows,
    ) -> WindowAccumulators {
        let mut result = WindowAccumulators::default();

        for record in Self::valid_records(records) {
            let Some(instant) = record.instant_of_record() else {
                continue;
            };
            let durations = StageDurationCalculator::calculate(record);
            for window in Window::ALL {
                if windows.get(window).contains(instant) {
                    result.windows[window.index()].add_durations(&durations);
                }
            }
        }

        result
    }

    /// Index of the bucket containing `t`, by binary search.
    fn find_bucket(buckets: &[TimeBucket], t: DateTime<Utc>) -> Option<usize> {
        let index = buckets.partition_point(|b| b.end < t);
        buckets
            .get(index)
            .filter(|b| b.contains(t))
            .map(|_| index)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
