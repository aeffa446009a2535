//! TATx efficiency per priority class.

use serde::Serialize;
use tracing::debug;

use tat_core::calculations::StageDurationCalculator;
use tat_core::formatting::format_average;
use tat_core::models::{LifecycleRecord, Priority};
use tat_core::scoring::{weighted_overall, TatxScore};
use tat_core::settings::TatTargets;

use crate::aggregator::{StageAccumulator, TatAggregator};

/// Score of one priority class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityScore {
    pub priority: Priority,
    pub score: TatxScore,
    /// Average total TAT in minutes, `0.0` when no record had one.
    pub actual_minutes: f64,
    pub actual: String,
    pub target_minutes: f64,
    pub count: u32,
}

/// TATx scores for every priority class plus their weighted overall.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TatxBreakdown {
    /// Test the breakdown was restricted to, if any.
    pub test_name: Option<String>,
    pub classes: Vec<PriorityScore>,
    pub overall: TatxScore,
    pub count: u32,
}

impl TatxBreakdown {
    pub fn class(&self, priority: Priority) -> Option<&PriorityScore> {
        self.classes.iter().find(|c| c.priority == priority)
    }
}

pub struct EfficiencyCalculator;

impl EfficiencyCalculator {
    /// Score the average total TAT of each priority class against its
    /// target.
    ///
    /// Only valid samples with a computable total count. With `test_name`
    /// the batch is restricted to that test (case-insensitive) and scored
    /// against its override targets when configured.
    pub fn breakdown(
        records: &[LifecycleRecord],
        targets: &TatTargets,
        test_name: Option<&str>,
    ) -> TatxBreakdown {
        let test_name = test_name.map(str::trim).filter(|name| !name.is_empty());
        let mut totals = [StageAccumulator::default(); 3];

        for record in TatAggregator::valid_records(records) {
            if let Some(wanted) = test_name {
                let matches = record
                    .test_name
                    .as_deref()
                    .is_some_and(|name| name.trim().eq_ignore_ascii_case(wanted));
                if !matches {
                    continue;
                }
            }
            totals[Self::slot(record.priority)].add(StageDurationCalculator::calculate(record).total);
        }

        let classes: Vec<PriorityScore> = Priority::ALL
            .iter()
            .map(|&priority| {
                let acc = &totals[Self::slot(priority)];
                let actual = acc.average();
                let target = targets.target_for(test_name, priority);
                PriorityScore {
                    priority,
                    score: TatxScore::new(target, actual),
                    actual_minutes: actual,
                    actual: format_average(actual),
                    target_minutes: target,
                    count: acc.count,
                }
            })
            .collect();

        let parts: Vec<(f64, u64)> = classes
            .iter()
            .map(|c| (c.score.value(), u64::from(c.count)))
            .collect();
        let overall = TatxScore::from(weighted_overall(&parts));
        let count = classes.iter().map(|c| c.count).sum();

        debug!(
            "TATx over {} records{}: overall {}",
            count,
            test_name.map(|t| format!(" for {}", t)).unwrap_or_default(),
            overall
        );

        TatxBreakdown {
            test_name: test_name.map(str::to_string),
            classes,
            overall,
            count,
        }
    }

    fn slot(priority: Priority) -> usize {
        match priority {
            Priority::Routine => 0,
            Priority::Urgent => 1,
            Priority::Emergency => 2,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
