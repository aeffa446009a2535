//! Top-level analysis pipeline.
//!
//! Loads records from disk, then runs the statistics facade, the trend
//! series and the TATx breakdown over them, returning an [`AnalysisResult`]
//! ready for rendering.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::info;

use tat_core::data_processors::{RecordDecoder, TimestampNormalizer};
use tat_core::error::Result;
use tat_core::models::LifecycleRecord;
use tat_core::periods::DateRange;
use tat_core::settings::TatTargets;

use crate::efficiency::TatxBreakdown;
use crate::reader::load_records;
use crate::statistics::{PeriodStatistics, TatAnalyzer, TrendSeries};

// ── Public types ──────────────────────────────────────────────────────────────

/// Inputs for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub data_path: PathBuf,
    /// Calendar used for naive timestamps and window boundaries.
    pub timezone: Tz,
    pub now: DateTime<Utc>,
    pub range: Option<DateRange>,
    pub targets: TatTargets,
    /// Restrict the TATx breakdown to one test.
    pub test_name: Option<String>,
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// The "now" the windows were computed around.
    pub now: String,
    pub timezone: String,
    pub range: Option<DateRange>,
    pub files_read: usize,
    /// Records decoded from disk, before any range filter.
    pub records_loaded: usize,
    /// Loaded records requested within the range; equals `records_loaded`
    /// without one.
    pub records_in_range: usize,
    /// Documents that could not be parsed or decoded.
    pub records_skipped: usize,
    pub duplicates: usize,
    /// Records that progressed past the request event.
    pub valid_samples: usize,
    /// Wall-clock seconds spent reading and decoding files.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent computing statistics.
    pub analysis_time_seconds: f64,
}

/// The complete output of [`analyze_records`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub metadata: AnalysisMetadata,
    pub statistics: PeriodStatistics,
    pub trend: TrendSeries,
    pub tatx: TatxBreakdown,
    /// Loaded records, within the range when one was given.
    #[serde(skip)]
    pub records: Vec<LifecycleRecord>,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full analysis pipeline.
///
/// 1. Load and decode every record under `options.data_path`.
/// 2. Compute daily, weekly and monthly stage statistics.
/// 3. Build the trend series for the range (or all time).
/// 4. Score TATx per priority over the records requested within the range.
pub fn analyze_records(options: &AnalysisOptions) -> Result<AnalysisResult> {
    // ── Step 1: Load records ──────────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let decoder = RecordDecoder::new(TimestampNormalizer::new(options.timezone));
    let loaded = load_records(&options.data_path, &decoder)?;
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 2-4: Statistics ──────────────────────────────────────────────────
    let analysis_start = std::time::Instant::now();
    let analyzer = TatAnalyzer::new(options.timezone);
    let range = options.range.as_ref();

    let statistics = analyzer.period_statistics(&loaded.records, range, options.now);
    let trend = analyzer.trend(&loaded.records, range);
    let records_loaded = loaded.records.len();
    let records = records_in_range(loaded.records, range);
    let tatx = analyzer.tatx(&records, &options.targets, options.test_name.as_deref());
    let analysis_time = analysis_start.elapsed().as_secs_f64();

    let valid_samples = records.iter().filter(|r| r.is_valid_sample()).count();
    info!(
        "Analysed {} records ({} valid) from {} files",
        records.len(),
        valid_samples,
        loaded.files.len()
    );

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        now: options.now.to_rfc3339(),
        timezone: options.timezone.name().to_string(),
        range: options.range,
        files_read: loaded.files.len(),
        records_loaded,
        records_in_range: records.len(),
        records_skipped: loaded.skipped,
        duplicates: loaded.duplicates,
        valid_samples,
        load_time_seconds: load_time,
        analysis_time_seconds: analysis_time,
    };

    Ok(AnalysisResult {
        metadata,
        statistics,
        trend,
        tatx,
        records,
    })
}

/// Keep the records requested within `range`; all of them when there is no
/// range.
pub fn records_in_range(
    records: Vec<LifecycleRecord>,
    range: Option<&DateRange>,
) -> Vec<LifecycleRecord> {
    match range {
        None => records,
        Some(range) => records
            .into_iter()
            .filter(|r| r.instant_of_record().is_some_and(|t| range.contains(t)))
            .collect(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tat_core::models::Priority;
    use tempfile::TempDir;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn write_records(dir: &std::path::Path) {
        let lines = [
            serde_json::json!({
                "id": "S-1",
                "priority": "routine",
                "requestedAt": "2024-03-14T08:00:00Z",
                "acceptedCollectionAt": "2024-03-14T08:10:00Z",
                "collectedAt": "2024-03-14T08:55:00Z",
                "receivedAt": "2024-03-14T09:10:00Z",
                "completedAt": "2024-03-14T12:10:00Z",
                "deliveredAt": "2024-03-14T12:40:00Z",
            }),
            serde_json::json!({
                "id": "S-2",
                "priority": "stat",
                "requestedAt": "2024-02-01T08:00:00Z",
                "receivedAt": "2024-02-01T08:30:00Z",
                "completedAt": "2024-02-01T09:00:00Z",
            }),
            serde_json::json!({
                "id": "S-3",
                "requestedAt": "2024-03-14T09:00:00Z",
            }),
        ];
        let mut file = std::fs::File::create(dir.join("records.jsonl")).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        writeln!(file, "garbage").unwrap();
    }

    fn options(dir: &std::path::Path, range: Option<DateRange>) -> AnalysisOptions {
        AnalysisOptions {
            data_path: dir.to_path_buf(),
            timezone: Tz::UTC,
            now: utc(2024, 3, 14, 18, 0),
            range,
            targets: TatTargets::default(),
            test_name: None,
        }
    }

    #[test]
    fn test_analyze_all_time() {
        let dir = TempDir::new().unwrap();
        write_records(dir.path());

        let result = analyze_records(&options(dir.path(), None)).unwrap();

        assert_eq!(result.metadata.files_read, 1);
        assert_eq!(result.metadata.records_loaded, 3);
        assert_eq!(result.metadata.records_in_range, 3);
        assert_eq!(result.metadata.records_skipped, 1);
        assert_eq!(result.metadata.valid_samples, 2);

        assert_eq!(result.statistics.daily.total.current, "3h 30m");
        assert_eq!(result.statistics.monthly.dispatch.count, 1);

        // S-2 is emergency: 30 minutes against a 60 minute target.
        let emergency = result.tatx.class(Priority::Emergency).unwrap();
        assert_eq!(emergency.score.to_string(), "200.0%");
        assert_eq!(result.trend.points.len(), 2);
    }

    #[test]
    fn test_analyze_with_range_restricts_records() {
        let dir = TempDir::new().unwrap();
        write_records(dir.path());
        let range = DateRange::new(utc(2024, 3, 1, 0, 0), utc(2024, 3, 31, 23, 59)).unwrap();

        let result = analyze_records(&options(dir.path(), Some(range))).unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.metadata.records_loaded, 3);
        assert_eq!(result.metadata.records_in_range, 2);
        assert_eq!(result.tatx.count, 1);
        assert!(result.tatx.class(Priority::Emergency).unwrap().count == 0);
    }

    #[test]
    fn test_analyze_missing_path_fails() {
        let opts = options(std::path::Path::new("/tmp/does-not-exist-tat-analysis"), None);
        assert!(analyze_records(&opts).is_err());
    }

    #[test]
    fn test_result_serializes_without_records() {
        let dir = TempDir::new().unwrap();
        write_records(dir.path());
        let result = analyze_records(&options(dir.path(), None)).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("records").is_none());
        assert_eq!(value["metadata"]["validSamples"], 2);
        assert_eq!(value["metadata"]["recordsInRange"], 3);
        assert_eq!(value["statistics"]["daily"]["dispatch"]["current"], "10m");
    }
}
