//! Reporting shapes for dashboard consumers and the [`TatAnalyzer`] facade
//! that produces them.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use tat_core::calculations::{StageDurationCalculator, StageDurations};
use tat_core::formatting::{format_average, NO_DATA};
use tat_core::models::{LifecycleRecord, Priority, SampleStatus, Stage};
use tat_core::periods::{BucketPlanner, DateRange, Granularity};
use tat_core::settings::TatTargets;
use tat_core::time_utils::LocalCalendar;

use crate::aggregator::{
    BucketAccumulator, FixedWindows, StageAccumulator, TatAggregator, Window,
};
use crate::efficiency::{EfficiencyCalculator, TatxBreakdown};

// ── StatCell ──────────────────────────────────────────────────────────────────

/// One window × stage figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatCell {
    /// Formatted average, `"N/A"` when not computable, or `"No Data"` when
    /// the batch held no valid samples.
    pub current: String,
    /// Average minutes.
    pub raw_minutes: f64,
    /// Samples contributing to the average.
    pub count: u32,
}

impl StatCell {
    pub fn no_data() -> Self {
        Self {
            current: NO_DATA.to_string(),
            raw_minutes: 0.0,
            count: 0,
        }
    }

    fn from_accumulator(acc: &StageAccumulator) -> Self {
        let average = acc.average();
        Self {
            current: format_average(average),
            raw_minutes: average,
            count: acc.count,
        }
    }
}

// ── WindowStatistics / PeriodStatistics ───────────────────────────────────────

/// Every stage's figure for one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStatistics {
    pub dispatch: StatCell,
    pub collection: StatCell,
    pub registration: StatCell,
    pub processing: StatCell,
    pub delivery: StatCell,
    pub total: StatCell,
}

impl WindowStatistics {
    fn no_data() -> Self {
        Self {
            dispatch: StatCell::no_data(),
            collection: StatCell::no_data(),
            registration: StatCell::no_data(),
            processing: StatCell::no_data(),
            delivery: StatCell::no_data(),
            total: StatCell::no_data(),
        }
    }

    fn from_accumulator(acc: &BucketAccumulator) -> Self {
        Self {
            dispatch: StatCell::from_accumulator(acc.stage(Stage::Dispatch)),
            collection: StatCell::from_accumulator(acc.stage(Stage::Collection)),
            registration: StatCell::from_accumulator(acc.stage(Stage::Registration)),
            processing: StatCell::from_accumulator(acc.stage(Stage::Processing)),
            delivery: StatCell::from_accumulator(acc.stage(Stage::Delivery)),
            total: StatCell::from_accumulator(acc.total()),
        }
    }

    pub fn get(&self, stage: Stage) -> &StatCell {
        match stage {
            Stage::Dispatch => &self.dispatch,
            Stage::Collection => &self.collection,
            Stage::Registration => &self.registration,
            Stage::Processing => &self.processing,
            Stage::Delivery => &self.delivery,
        }
    }
}

/// Stage figures for the daily, weekly and monthly windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStatistics {
    pub daily: WindowStatistics,
    pub weekly: WindowStatistics,
    pub monthly: WindowStatistics,
}

impl PeriodStatistics {
    /// Every cell reports "No Data".
    pub fn no_data() -> Self {
        Self {
            daily: WindowStatistics::no_data(),
            weekly: WindowStatistics::no_data(),
            monthly: WindowStatistics::no_data(),
        }
    }

    pub fn window(&self, window: Window) -> &WindowStatistics {
        match window {
            Window::Daily => &self.daily,
            Window::Weekly => &self.weekly,
            Window::Monthly => &self.monthly,
        }
    }
}

// ── Trend series ──────────────────────────────────────────────────────────────

/// Average stage minutes for one populated bucket, for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub label: String,
    pub key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub dispatch: u64,
    pub collection: u64,
    pub registration: u64,
    pub processing: u64,
    pub delivery: u64,
    pub total: u64,
    /// Records placed in this bucket.
    pub count: u32,
}

impl TrendPoint {
    pub fn get(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Dispatch => self.dispatch,
            Stage::Collection => self.collection,
            Stage::Registration => self.registration,
            Stage::Processing => self.processing,
            Stage::Delivery => self.delivery,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub granularity: Granularity,
    pub points: Vec<TrendPoint>,
}

// ── RecordBreakdown ───────────────────────────────────────────────────────────

/// One record's durations with display labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBreakdown {
    pub id: String,
    pub priority: Priority,
    pub status: SampleStatus,
    pub test_name: Option<String>,
    pub valid: bool,
    pub minutes: StageDurations,
    pub dispatch: String,
    pub collection: String,
    pub registration: String,
    pub processing: String,
    pub delivery: String,
    pub total: String,
}

// ── TatAnalyzer ───────────────────────────────────────────────────────────────

/// Entry point for all turnaround statistics.
///
/// Holds only the calendar used for day, week and month boundaries; every
/// call recomputes from the records it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct TatAnalyzer {
    calendar: LocalCalendar,
}

impl TatAnalyzer {
    pub fn new(tz: Tz) -> Self {
        Self {
            calendar: LocalCalendar::new(tz),
        }
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }

    /// Daily, weekly and monthly stage averages.
    ///
    /// Without a range the windows are today, this week and this month
    /// around `now`. With a range each window is the range widened to whole
    /// days, Monday-start weeks or calendar months. When no record is a
    /// valid sample every cell is "No Data".
    pub fn period_statistics(
        &self,
        records: &[LifecycleRecord],
        range: Option<&DateRange>,
        now: DateTime<Utc>,
    ) -> PeriodStatistics {
        if !records.iter().any(LifecycleRecord::is_valid_sample) {
            return PeriodStatistics::no_data();
        }

        let windows = match range {
            Some(range) => FixedWindows::widened(range, &self.calendar),
            None => FixedWindows::around(now, &self.calendar),
        };
        let acc = TatAggregator::aggregate_windows(records, &windows);

        PeriodStatistics {
            daily: WindowStatistics::from_accumulator(acc.get(Window::Daily)),
            weekly: WindowStatistics::from_accumulator(acc.get(Window::Weekly)),
            monthly: WindowStatistics::from_accumulator(acc.get(Window::Monthly)),
        }
    }

    /// Per-bucket stage averages for charting.
    ///
    /// Without a range, only the Monday-start weeks in which valid samples
    /// were requested get a bucket.
    pub fn trend(&self, records: &[LifecycleRecord], range: Option<&DateRange>) -> TrendSeries {
        let planner = BucketPlanner::new(self.calendar);
        let (granularity, buckets) = match range {
            Some(range) => planner.plan(range),
            None => {
                let requested = records
                    .iter()
                    .filter(|r| r.is_valid_sample())
                    .filter_map(LifecycleRecord::instant_of_record);
                (Granularity::Weekly, planner.weeks_containing(requested))
            }
        };

        let points = TatAggregator::aggregate_buckets(records, &buckets)
            .into_iter()
            .map(|summary| {
                let acc = &summary.accumulator;
                let avg = |a: &StageAccumulator| a.average().round() as u64;
                TrendPoint {
                    label: summary.bucket.label,
                    key: summary.bucket.key,
                    start: summary.bucket.start,
                    end: summary.bucket.end,
                    dispatch: avg(acc.stage(Stage::Dispatch)),
                    collection: avg(acc.stage(Stage::Collection)),
                    registration: avg(acc.stage(Stage::Registration)),
                    processing: avg(acc.stage(Stage::Processing)),
                    delivery: avg(acc.stage(Stage::Delivery)),
                    total: avg(acc.total()),
                    count: acc.samples(),
                }
            })
            .collect();

        TrendSeries {
            granularity,
            points,
        }
    }

    /// TATx scores per priority class against `targets`.
    pub fn tatx(
        &self,
        records: &[LifecycleRecord],
        targets: &TatTargets,
        test_name: Option<&str>,
    ) -> TatxBreakdown {
        EfficiencyCalculator::breakdown(records, targets, test_name)
    }

    /// Durations and labels for a single record.
    pub fn record_breakdown(record: &LifecycleRecord) -> RecordBreakdown {
        let d = StageDurationCalculator::calculate(record);
        RecordBreakdown {
            id: record.id.clone(),
            priority: record.priority,
            status: record.status,
            test_name: record.test_name.clone(),
            valid: record.is_valid_sample(),
            minutes: d,
            dispatch: d.label(Stage::Dispatch),
            collection: d.label(Stage::Collection),
            registration: d.label(Stage::Registration),
            processing: d.label(Stage::Processing),
            delivery: d.label(Stage::Delivery),
            total: d.total_label(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use serde_json::json;
    use tat_core::data_processors::RecordDecoder;
    use tat_core::models::LifecycleTimestamps;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        utc(2024, 3, 14, 18, 0)
    }

    /// Full lifecycle requested at `t`, offsets in minutes.
    fn full_record(t: DateTime<Utc>) -> LifecycleRecord {
        let at = |m: i64| Some(t + Duration::minutes(m));
        LifecycleRecord {
            id: "A".to_string(),
            timestamps: LifecycleTimestamps {
                requested: at(0),
                accepted: at(10),
                collected: at(55),
                registered: None,
                received: at(70),
                completed: at(250),
                delivered: at(280),
            },
            ..Default::default()
        }
    }

    fn all_cells(stats: &PeriodStatistics) -> Vec<&StatCell> {
        Window::ALL
            .iter()
            .flat_map(|w| {
                let ws = stats.window(*w);
                Stage::ALL
                    .iter()
                    .map(move |s| ws.get(*s))
                    .chain(std::iter::once(&ws.total))
            })
            .collect()
    }

    // ── period_statistics ─────────────────────────────────────────────────────

    #[test]
    fn test_empty_batch_is_no_data_everywhere() {
        let stats = TatAnalyzer::default().period_statistics(&[], None, now());
        let cells = all_cells(&stats);
        assert_eq!(cells.len(), 18);
        for cell in cells {
            assert_eq!(cell, &StatCell::no_data());
            assert_eq!(cell.current, "No Data");
        }
    }

    #[test]
    fn test_request_only_batch_is_no_data() {
        let records = vec![LifecycleRecord {
            timestamps: LifecycleTimestamps {
                requested: Some(utc(2024, 3, 14, 9, 0)),
                ..Default::default()
            },
            ..Default::default()
        }];
        let stats = TatAnalyzer::default().period_statistics(&records, None, now());
        assert_eq!(stats.daily.dispatch.current, "No Data");
    }

    #[test]
    fn test_full_lifecycle_record_today() {
        let records = vec![full_record(utc(2024, 3, 14, 8, 0))];
        let stats = TatAnalyzer::default().period_statistics(&records, None, now());

        let daily = &stats.daily;
        assert_eq!(daily.dispatch.current, "10m");
        assert_eq!(daily.collection.current, "45m");
        assert_eq!(daily.registration.current, "N/A");
        assert_eq!(daily.registration.count, 0);
        assert_eq!(daily.processing.current, "3h ");
        assert_eq!(daily.delivery.current, "30m");
        assert_eq!(daily.total.current, "3h 30m");
        assert_eq!(daily.processing.count, 1);
        assert!((daily.processing.raw_minutes - 180.0).abs() < 1e-9);

        assert_eq!(stats.weekly, stats.daily);
        assert_eq!(stats.monthly, stats.daily);
    }

    #[test]
    fn test_valid_batch_outside_windows_is_not_available() {
        let records = vec![full_record(utc(2023, 1, 10, 8, 0))];
        let stats = TatAnalyzer::default().period_statistics(&records, None, now());
        assert_eq!(stats.daily.dispatch.current, "N/A");
        assert_eq!(stats.monthly.total.count, 0);
    }

    #[test]
    fn test_range_windows_are_widened() {
        let analyzer = TatAnalyzer::default();
        let range = DateRange::new(utc(2024, 3, 5, 12, 0), utc(2024, 3, 5, 13, 0)).unwrap();
        let records = vec![
            full_record(utc(2024, 3, 5, 8, 0)),  // same day, outside the raw range
            full_record(utc(2024, 3, 7, 8, 0)),  // same Monday-start week
            full_record(utc(2024, 3, 28, 8, 0)), // same month
        ];
        let stats = analyzer.period_statistics(&records, Some(&range), now());
        assert_eq!(stats.daily.dispatch.count, 1);
        assert_eq!(stats.weekly.dispatch.count, 2);
        assert_eq!(stats.monthly.dispatch.count, 3);
    }

    #[test]
    fn test_pre_lab_record_total_falls_back_to_not_available() {
        let t = utc(2024, 3, 14, 8, 0);
        let records = vec![LifecycleRecord {
            timestamps: LifecycleTimestamps {
                requested: Some(t),
                accepted: Some(t + Duration::minutes(15)),
                collected: Some(t + Duration::minutes(50)),
                ..Default::default()
            },
            ..Default::default()
        }];
        let stats = TatAnalyzer::default().period_statistics(&records, None, now());
        assert_eq!(stats.daily.dispatch.current, "15m");
        assert_eq!(stats.daily.collection.current, "35m");
        assert_eq!(stats.daily.total.current, "N/A");
    }

    #[test]
    fn test_statistics_json_shape() {
        let stats = TatAnalyzer::default().period_statistics(&[], None, now());
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            value["weekly"]["processing"],
            json!({"current": "No Data", "rawMinutes": 0.0, "count": 0})
        );
    }

    #[test]
    fn test_statistics_from_decoded_mixed_schemas() {
        let decoder = RecordDecoder::default();
        let batch = decoder.decode_batch(&[
            json!({
                "id": "new-schema",
                "requestedAt": "2024-03-14T08:00:00Z",
                "acceptedCollectionAt": "2024-03-14T08:20:00Z"
            }),
            json!({
                "id": "old-schema",
                "time_requested": {"seconds": 1_710_403_200},
                "driver_assigned_at": {"seconds": 1_710_403_800}
            }),
            json!("not a record"),
        ]);
        assert_eq!(batch.skipped, 1);

        let stats = TatAnalyzer::default().period_statistics(&batch.records, None, now());
        // 20 minutes and 10 minutes.
        assert_eq!(stats.daily.dispatch.count, 2);
        assert_eq!(stats.daily.dispatch.current, "15m");
    }

    // ── trend ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_trend_daily_points() {
        let analyzer = TatAnalyzer::default();
        let range = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            analyzer.calendar(),
        )
        .unwrap();
        let records = vec![
            full_record(utc(2024, 3, 1, 8, 0)),
            full_record(utc(2024, 3, 3, 8, 0)),
        ];
        let series = analyzer.trend(&records, Some(&range));

        assert_eq!(series.granularity, Granularity::Daily);
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].label, "Mar 01");
        assert_eq!(series.points[0].dispatch, 10);
        assert_eq!(series.points[0].total, 210);
        assert_eq!(series.points[1].key, "2024-03-03");
        assert_eq!(series.points[1].get(Stage::Registration), 0);
    }

    #[test]
    fn test_trend_all_time_is_weekly_over_populated_weeks() {
        let records = vec![
            full_record(utc(2024, 3, 4, 8, 0)),
            full_record(utc(2024, 3, 20, 8, 0)),
        ];
        let series = TatAnalyzer::default().trend(&records, None);
        assert_eq!(series.granularity, Granularity::Weekly);
        let keys: Vec<&str> = series.points.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-W10", "2024-W12"]);
    }

    #[test]
    fn test_trend_all_time_with_far_future_outliers() {
        let last_day = NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap().and_utc();
        let records = vec![
            full_record(utc(2024, 3, 4, 8, 0)),
            full_record(utc(56170, 6, 1, 8, 0)),
            full_record(last_day),
        ];
        let series = TatAnalyzer::default().trend(&records, None);

        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[0].key, "2024-W10");
        assert_eq!(series.points[0].total, 210);
        assert_eq!(series.points[2].end, DateTime::<Utc>::MAX_UTC);
        assert!(series.points.iter().all(|p| p.count == 1));
    }

    #[test]
    fn test_trend_empty() {
        let series = TatAnalyzer::default().trend(&[], None);
        assert!(series.points.is_empty());
    }

    // ── record_breakdown ──────────────────────────────────────────────────────

    #[test]
    fn test_record_breakdown_labels() {
        let breakdown = TatAnalyzer::record_breakdown(&full_record(utc(2024, 3, 14, 8, 0)));
        assert!(breakdown.valid);
        assert_eq!(breakdown.dispatch, "10m");
        assert_eq!(breakdown.registration, "N/A");
        assert_eq!(breakdown.total, "3h 30m");
        assert_eq!(breakdown.minutes.processing, 180);
    }
}
