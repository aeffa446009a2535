use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TatError};
use crate::models::{LifecycleRecord, LifecycleTimestamps, Priority, SampleStatus};

// ── Field aliases ─────────────────────────────────────────────────────────────

/// Ordered alias lists for every field the decoder reads.
///
/// Two export schemas name the same concepts differently; the first alias
/// holding a usable value wins.
pub mod aliases {
    pub const REQUESTED: &[&str] = &["requestedAt", "requested_at", "time_requested", "created_at"];
    pub const ACCEPTED: &[&str] = &[
        "acceptedCollectionAt",
        "accepted_collection_at",
        "driverAssignedAt",
        "driver_assigned_at",
    ];
    pub const COLLECTED: &[&str] = &["collectedAt", "collected_at", "time_collected"];
    pub const REGISTERED: &[&str] = &["registeredAt", "registered_at", "time_registered"];
    pub const RECEIVED: &[&str] = &["receivedAt", "received_at"];
    pub const COMPLETED: &[&str] = &["completedAt", "completed_at"];
    pub const DELIVERED: &[&str] = &["deliveredAt", "delivered_at"];

    pub const ID: &[&str] = &["id", "sampleId", "sample_id"];
    pub const PRIORITY: &[&str] = &["priority", "urgency", "priorityLevel"];
    pub const STATUS: &[&str] = &["status"];
    pub const TEST_NAME: &[&str] = &["testName", "test_name", "test"];
}

// ── RawTimestamp ──────────────────────────────────────────────────────────────

/// The shapes a lifecycle instant can take on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    /// ISO 8601 text, with or without an offset.
    Iso(String),
    /// Milliseconds since the Unix epoch, as a serialised `Date` produces.
    EpochMillis(f64),
    /// Firestore-style `{seconds, nanoseconds}` object.
    Seconds { seconds: i64, nanos: u32 },
    /// Null, absent, or an unrecognised shape.
    Missing,
}

impl RawTimestamp {
    /// Classify a JSON value without interpreting it.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => RawTimestamp::Iso(s.clone()),
            Value::Number(n) => n
                .as_f64()
                .map(RawTimestamp::EpochMillis)
                .unwrap_or(RawTimestamp::Missing),
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(as_whole_number);
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(as_whole_number)
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(0);
                match seconds {
                    Some(seconds) => RawTimestamp::Seconds { seconds, nanos },
                    None => RawTimestamp::Missing,
                }
            }
            _ => RawTimestamp::Missing,
        }
    }
}

fn as_whole_number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
}

// ── TimestampNormalizer ───────────────────────────────────────────────────────

/// Decodes [`RawTimestamp`] values into canonical UTC instants.
///
/// Naive date-times (no offset) are read in the configured timezone;
/// date-only strings are read as UTC midnight. The Unix epoch itself is the
/// "invalid" sentinel and is never returned as a real instant.
#[derive(Debug, Clone, Copy)]
pub struct TimestampNormalizer {
    tz: Tz,
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimestampNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Decode a JSON value straight to an instant.
    pub fn normalize_value(&self, value: &Value) -> Option<DateTime<Utc>> {
        self.normalize(&RawTimestamp::from_value(value))
    }

    /// Decode a raw timestamp. Anything unparseable becomes `None`.
    pub fn normalize(&self, raw: &RawTimestamp) -> Option<DateTime<Utc>> {
        let dt = match raw {
            RawTimestamp::Iso(s) => self.parse_str(s),
            RawTimestamp::EpochMillis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(ms.trunc() as i64)
            }
            RawTimestamp::EpochMillis(_) => None,
            RawTimestamp::Seconds { seconds, nanos } => DateTime::from_timestamp(*seconds, *nanos),
            RawTimestamp::Missing => None,
        }?;
        (dt.timestamp_millis() != 0).then_some(dt)
    }

    /// Epoch milliseconds for `value`, or the sentinel `0` when it cannot be
    /// decoded.
    pub fn epoch_millis(&self, value: &Value) -> i64 {
        self.normalize_value(value)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    fn parse_str(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        // Replace trailing 'Z' with '+00:00' for RFC 3339 compatibility.
        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        for fmt in FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(self.localize(naive));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive));
        }

        debug!("TimestampNormalizer: could not parse timestamp string \"{}\"", s);
        None
    }

    fn localize(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            // Inside a DST gap; read the wall-clock time as UTC rather than drop it.
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }
}

// ── RecordDecoder ─────────────────────────────────────────────────────────────

/// Records decoded from a batch, plus how many were rejected.
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    pub records: Vec<LifecycleRecord>,
    pub skipped: usize,
}

/// Decodes raw JSON documents of either export schema into
/// [`LifecycleRecord`]s through the [`aliases`] table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordDecoder {
    normalizer: TimestampNormalizer,
}

impl RecordDecoder {
    pub fn new(normalizer: TimestampNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &TimestampNormalizer {
        &self.normalizer
    }

    /// Decode a single document.
    ///
    /// Fails only when the document is not an object or its identifier has
    /// an impossible type; every other defect degrades to a missing field.
    pub fn decode(&self, value: &Value) -> Result<LifecycleRecord> {
        let Value::Object(_) = value else {
            return Err(TatError::MalformedRecord {
                id: None,
                reason: format!("expected a JSON object, found {}", json_type_name(value)),
            });
        };

        let id = match first_populated(value, aliases::ID) {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(TatError::MalformedRecord {
                    id: None,
                    reason: format!("identifier must be a string, found {}", json_type_name(other)),
                })
            }
        };

        let priority = match self.text_field(value, aliases::PRIORITY) {
            Some(label) => Priority::parse(&label).unwrap_or_else(|| {
                debug!("Record {}: unknown priority \"{}\", using routine", id, label);
                Priority::Routine
            }),
            None => Priority::Routine,
        };

        let status = self
            .text_field(value, aliases::STATUS)
            .map(|s| SampleStatus::parse(&s))
            .unwrap_or_default();

        let test_name = self.text_field(value, aliases::TEST_NAME);

        let timestamps = LifecycleTimestamps {
            requested: self.instant(value, aliases::REQUESTED),
            accepted: self.instant(value, aliases::ACCEPTED),
            collected: self.instant(value, aliases::COLLECTED),
            registered: self.instant(value, aliases::REGISTERED),
            received: self.instant(value, aliases::RECEIVED),
            completed: self.instant(value, aliases::COMPLETED),
            delivered: self.instant(value, aliases::DELIVERED),
        };

        Ok(LifecycleRecord {
            id,
            priority,
            status,
            test_name,
            timestamps,
        })
    }

    /// Decode every document, logging and skipping the malformed ones.
    pub fn decode_batch<'a, I>(&self, values: I) -> DecodedBatch
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut batch = DecodedBatch::default();
        for (index, value) in values.into_iter().enumerate() {
            match self.decode(value) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    warn!("Skipping record #{}: {}", index, e);
                    batch.skipped += 1;
                }
            }
        }
        batch
    }

    /// First alias that normalises to a real instant.
    /// Only the first non-null alias is normalised; an unparseable value
    /// there leaves the instant unset.
    fn instant(&self, value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
        first_populated(value, keys).and_then(|v| self.normalizer.normalize_value(v))
    }

    fn text_field(&self, value: &Value, keys: &[&str]) -> Option<String> {
        first_populated(value, keys)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// First alias present with a non-null value.
fn first_populated<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
