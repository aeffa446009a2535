use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clinical priority class of a sample request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Standard turnaround.
    #[default]
    Routine,
    /// Expedited turnaround.
    Urgent,
    /// Immediate turnaround (`stat` on some request forms).
    Emergency,
}

impl Priority {
    /// Every priority class in display order.
    pub const ALL: [Priority; 3] = [Priority::Routine, Priority::Urgent, Priority::Emergency];

    /// Parse a priority label case-insensitively.
    ///
    /// `stat` is accepted as a synonym for emergency. Unknown labels return
    /// `None` so the caller can decide on a fallback.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "routine" | "normal" => Some(Priority::Routine),
            "urgent" => Some(Priority::Urgent),
            "emergency" | "stat" => Some(Priority::Emergency),
            _ => None,
        }
    }

    /// Lowercase key used in JSON output and configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Routine => "routine",
            Priority::Urgent => "urgent",
            Priority::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow status reported by the source system.
///
/// Carried through for display only; aggregation never filters on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    Pending,
    Accepted,
    Collected,
    Registered,
    Received,
    Processing,
    Completed,
    Delivered,
    Cancelled,
    #[default]
    Unknown,
}

impl SampleStatus {
    /// Parse a status label, tolerating the spelling variants seen in exports.
    pub fn parse(label: &str) -> Self {
        let normalised = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalised.as_str() {
            "pending" | "requested" => SampleStatus::Pending,
            "accepted" | "assigned" | "driver_assigned" => SampleStatus::Accepted,
            "collected" | "in_transit" => SampleStatus::Collected,
            "registered" => SampleStatus::Registered,
            "received" => SampleStatus::Received,
            "processing" | "in_progress" | "testing" => SampleStatus::Processing,
            "completed" | "resulted" => SampleStatus::Completed,
            "delivered" => SampleStatus::Delivered,
            "cancelled" | "canceled" | "rejected" => SampleStatus::Cancelled,
            _ => SampleStatus::Unknown,
        }
    }
}

/// The seven lifecycle instants a sample may carry, all optional.
///
/// Instants are expected to be monotonic in field order but nothing relies
/// on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleTimestamps {
    pub requested: Option<DateTime<Utc>>,
    /// Collection accepted or driver assigned.
    pub accepted: Option<DateTime<Utc>>,
    pub collected: Option<DateTime<Utc>>,
    pub registered: Option<DateTime<Utc>>,
    pub received: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub delivered: Option<DateTime<Utc>>,
}

impl LifecycleTimestamps {
    /// `true` when any instant after the initial request is present.
    pub fn has_progress(&self) -> bool {
        [
            self.accepted,
            self.collected,
            self.registered,
            self.received,
            self.completed,
            self.delivered,
        ]
        .iter()
        .any(Option::is_some)
    }

    /// Earliest and latest instant present, if any.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let present = [
            self.requested,
            self.accepted,
            self.collected,
            self.registered,
            self.received,
            self.completed,
            self.delivered,
        ];
        let mut iter = present.into_iter().flatten();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }
}

/// A sample-lifecycle record in canonical form.
///
/// Both wire schemas decode into this one type; see
/// [`crate::data_processors::RecordDecoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRecord {
    /// Source document identifier; empty when the export carried none.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: SampleStatus,
    /// Name of the requested test, used to pick a TATx target.
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub timestamps: LifecycleTimestamps,
}

impl LifecycleRecord {
    /// A record is eligible for aggregation only once it has moved past the
    /// request event.
    pub fn is_valid_sample(&self) -> bool {
        self.timestamps.has_progress()
    }

    /// The instant used to place the record in a time bucket or window.
    pub fn instant_of_record(&self) -> Option<DateTime<Utc>> {
        self.timestamps.requested
    }
}

/// One named leg of the sample pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Request to collection accepted / driver assigned.
    Dispatch,
    /// Accepted to collected.
    Collection,
    /// Request to registration.
    Registration,
    /// Received at the lab to completed.
    Processing,
    /// Completed to delivered.
    Delivery,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Dispatch,
        Stage::Collection,
        Stage::Registration,
        Stage::Processing,
        Stage::Delivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dispatch => "dispatch",
            Stage::Collection => "collection",
            Stage::Registration => "registration",
            Stage::Processing => "processing",
            Stage::Delivery => "delivery",
        }
    }

    /// Position of the stage in [`Stage::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 12, h, m, 0).unwrap()
    }

    // ── Priority ─────────────────────────────────────────────────────────────

    #[test]
    fn test_priority_parse_case_insensitive() {
        assert_eq!(Priority::parse("URGENT"), Some(Priority::Urgent));
        assert_eq!(Priority::parse(" Routine "), Some(Priority::Routine));
        assert_eq!(Priority::parse("Emergency"), Some(Priority::Emergency));
    }

    #[test]
    fn test_priority_parse_stat_is_emergency() {
        assert_eq!(Priority::parse("stat"), Some(Priority::Emergency));
    }

    #[test]
    fn test_priority_parse_unknown() {
        assert_eq!(Priority::parse("whenever"), None);
    }

    #[test]
    fn test_priority_serde_lowercase() {
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let back: Priority = serde_json::from_str("\"emergency\"").unwrap();
        assert_eq!(back, Priority::Emergency);
    }

    // ── SampleStatus ─────────────────────────────────────────────────────────

    #[test]
    fn test_status_parse_variants() {
        assert_eq!(SampleStatus::parse("In Progress"), SampleStatus::Processing);
        assert_eq!(SampleStatus::parse("driver-assigned"), SampleStatus::Accepted);
        assert_eq!(SampleStatus::parse("canceled"), SampleStatus::Cancelled);
        assert_eq!(SampleStatus::parse("DELIVERED"), SampleStatus::Delivered);
    }

    #[test]
    fn test_status_parse_unknown() {
        assert_eq!(SampleStatus::parse("lost in space"), SampleStatus::Unknown);
    }

    // ── LifecycleTimestamps ──────────────────────────────────────────────────

    #[test]
    fn test_request_only_has_no_progress() {
        let ts = LifecycleTimestamps {
            requested: Some(at(8, 0)),
            ..Default::default()
        };
        assert!(!ts.has_progress());
    }

    #[test]
    fn test_any_later_instant_counts_as_progress() {
        let ts = LifecycleTimestamps {
            delivered: Some(at(12, 0)),
            ..Default::default()
        };
        assert!(ts.has_progress());
    }

    #[test]
    fn test_span_handles_out_of_order_instants() {
        let ts = LifecycleTimestamps {
            requested: Some(at(9, 0)),
            collected: Some(at(8, 0)),
            delivered: Some(at(14, 30)),
            ..Default::default()
        };
        assert_eq!(ts.span(), Some((at(8, 0), at(14, 30))));
    }

    #[test]
    fn test_span_empty() {
        assert_eq!(LifecycleTimestamps::default().span(), None);
    }

    // ── LifecycleRecord ──────────────────────────────────────────────────────

    #[test]
    fn test_record_validity_and_instant() {
        let record = LifecycleRecord {
            id: "S-1".to_string(),
            timestamps: LifecycleTimestamps {
                requested: Some(at(8, 0)),
                accepted: Some(at(8, 10)),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(record.is_valid_sample());
        assert_eq!(record.instant_of_record(), Some(at(8, 0)));
    }

    // ── Stage ────────────────────────────────────────────────────────────────

    #[test]
    fn test_stage_index_matches_all_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Registration.to_string(), "registration");
    }
}
