use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::formatting::format_duration;
use crate::models::{LifecycleRecord, LifecycleTimestamps, Stage};

/// Anything that carries the seven lifecycle instants.
pub trait HasLifecycle {
    fn lifecycle(&self) -> &LifecycleTimestamps;
}

impl HasLifecycle for LifecycleTimestamps {
    fn lifecycle(&self) -> &LifecycleTimestamps {
        self
    }
}

impl HasLifecycle for LifecycleRecord {
    fn lifecycle(&self) -> &LifecycleTimestamps {
        &self.timestamps
    }
}

/// Whole minutes from `start` to `end`.
///
/// Returns `0` when either endpoint is missing, and clamps out-of-order
/// pairs to `0` instead of going negative.
pub fn duration_minutes(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> u64 {
    let (Some(start), Some(end)) = (start, end) else {
        return 0;
    };
    let millis = (end - start).num_milliseconds();
    millis.div_euclid(60_000).max(0) as u64
}

// ── StageDurations ────────────────────────────────────────────────────────────

/// Per-record stage durations in whole minutes; `0` means not computable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDurations {
    pub dispatch: u64,
    pub collection: u64,
    pub registration: u64,
    pub processing: u64,
    pub delivery: u64,
    pub total: u64,
}

impl StageDurations {
    pub fn get(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Dispatch => self.dispatch,
            Stage::Collection => self.collection,
            Stage::Registration => self.registration,
            Stage::Processing => self.processing,
            Stage::Delivery => self.delivery,
        }
    }

    /// Formatted label for one stage (`"N/A"` when zero).
    pub fn label(&self, stage: Stage) -> String {
        format_duration(self.get(stage))
    }

    pub fn total_label(&self) -> String {
        format_duration(self.total)
    }

    /// `(stage, minutes)` pairs in [`Stage::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, u64)> + '_ {
        Stage::ALL.into_iter().map(move |stage| (stage, self.get(stage)))
    }
}

// ── StageDurationCalculator ───────────────────────────────────────────────────

/// Stateless resolver of stage durations for a single record.
pub struct StageDurationCalculator;

impl StageDurationCalculator {
    /// Resolve all five stage durations plus the total for `record`.
    ///
    /// The total is measured from lab receipt to delivery (or to completion
    /// when delivery is missing). When that span is not computable it falls
    /// back to `processing + delivery`, which equals a single leg when only
    /// one of the two is known.
    pub fn calculate<R: HasLifecycle + ?Sized>(record: &R) -> StageDurations {
        let ts = record.lifecycle();

        let dispatch = duration_minutes(ts.requested, ts.accepted);
        let collection = duration_minutes(ts.accepted, ts.collected);
        let registration = duration_minutes(ts.requested, ts.registered);
        let processing = duration_minutes(ts.received, ts.completed);
        let delivery = duration_minutes(ts.completed, ts.delivered);

        let mut total = duration_minutes(ts.received, ts.delivered.or(ts.completed));
        if total == 0 {
            total = processing + delivery;
        }

        StageDurations {
            dispatch,
            collection,
            registration,
            processing,
            delivery,
            total,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 3, 8, 0, 0).unwrap()
    }

    fn plus(minutes: i64) -> Option<DateTime<Utc>> {
        Some(t0() + Duration::minutes(minutes))
    }

    // ── duration_minutes ─────────────────────────────────────────────────────

    #[test]
    fn test_duration_basic() {
        assert_eq!(duration_minutes(plus(0), plus(45)), 45);
    }

    #[test]
    fn test_duration_floors_partial_minutes() {
        let end = t0() + Duration::seconds(119);
        assert_eq!(duration_minutes(Some(t0()), Some(end)), 1);
    }

    #[test]
    fn test_duration_out_of_order_is_zero() {
        assert_eq!(duration_minutes(plus(30), plus(0)), 0);
        let just_before = t0() - Duration::milliseconds(1);
        assert_eq!(duration_minutes(Some(t0()), Some(just_before)), 0);
    }

    #[test]
    fn test_duration_missing_endpoint_is_zero() {
        assert_eq!(duration_minutes(None, plus(10)), 0);
        assert_eq!(duration_minutes(plus(10), None), 0);
        assert_eq!(duration_minutes(None, None), 0);
    }

    // ── StageDurationCalculator ──────────────────────────────────────────────

    #[test]
    fn test_full_lifecycle_scenario() {
        let ts = LifecycleTimestamps {
            requested: plus(0),
            accepted: plus(10),
            collected: plus(55),
            registered: None,
            received: plus(70),
            completed: plus(250),
            delivered: plus(280),
        };
        let d = StageDurationCalculator::calculate(&ts);

        assert_eq!(d.label(Stage::Dispatch), "10m");
        assert_eq!(d.label(Stage::Collection), "45m");
        assert_eq!(d.label(Stage::Registration), "N/A");
        assert_eq!(d.label(Stage::Processing), "3h ");
        assert_eq!(d.label(Stage::Delivery), "30m");
        assert_eq!(d.total_label(), "3h 30m");
    }

    #[test]
    fn test_pre_lab_only_record_has_no_total() {
        let ts = LifecycleTimestamps {
            requested: plus(0),
            accepted: plus(12),
            collected: plus(40),
            ..Default::default()
        };
        let d = StageDurationCalculator::calculate(&ts);

        assert_eq!(d.dispatch, 12);
        assert_eq!(d.collection, 28);
        assert_eq!(d.total, 0);
        assert_eq!(d.total_label(), "N/A");
    }

    #[test]
    fn test_total_uses_completed_when_not_delivered() {
        let ts = LifecycleTimestamps {
            received: plus(0),
            completed: plus(95),
            ..Default::default()
        };
        let d = StageDurationCalculator::calculate(&ts);
        assert_eq!(d.total, 95);
        assert_eq!(d.delivery, 0);
    }

    #[test]
    fn test_total_falls_back_to_single_leg() {
        // No receipt instant: only the delivery leg is known.
        let ts = LifecycleTimestamps {
            completed: plus(0),
            delivered: plus(25),
            ..Default::default()
        };
        let d = StageDurationCalculator::calculate(&ts);
        assert_eq!(d.processing, 0);
        assert_eq!(d.total, 25);
    }

    #[test]
    fn test_registration_measured_from_request() {
        let ts = LifecycleTimestamps {
            requested: plus(0),
            registered: plus(130),
            ..Default::default()
        };
        let d = StageDurationCalculator::calculate(&ts);
        assert_eq!(d.label(Stage::Registration), "2h 10m");
    }

    #[test]
    fn test_out_of_order_stages_degrade_to_zero() {
        let ts = LifecycleTimestamps {
            requested: plus(60),
            accepted: plus(0),
            ..Default::default()
        };
        let d = StageDurationCalculator::calculate(&ts);
        assert_eq!(d.dispatch, 0);
    }

    #[test]
    fn test_record_implements_has_lifecycle() {
        let record = LifecycleRecord {
            timestamps: LifecycleTimestamps {
                requested: plus(0),
                accepted: plus(7),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(StageDurationCalculator::calculate(&record).dispatch, 7);
    }

    #[test]
    fn test_iter_follows_stage_order() {
        let d = StageDurations {
            dispatch: 1,
            collection: 2,
            registration: 3,
            processing: 4,
            delivery: 5,
            total: 9,
        };
        let values: Vec<u64> = d.iter().map(|(_, m)| m).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }
}
