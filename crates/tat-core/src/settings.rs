use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Parser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Result, TatError};
use crate::models::Priority;
use crate::periods::DateRange;
use crate::time_utils::LocalCalendar;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Turnaround-time analytics for sample lifecycle exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tat-analytics",
    about = "Turnaround-time analytics for sample lifecycle exports",
    version
)]
pub struct Settings {
    /// File or directory of .json / .jsonl record exports
    /// (defaults to ~/.tat-analytics/data when present)
    #[arg(long, env = "TAT_DATA_PATH")]
    pub data: Option<PathBuf>,

    /// Report to produce
    #[arg(long, default_value = "summary", value_parser = ["summary", "trend", "tatx", "records"])]
    pub view: String,

    /// First day of an explicit range (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Last day of an explicit range (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub to: Option<String>,

    /// Relative range ending now, e.g. 24h, 7d, 2w, 3m
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub last: Option<String>,

    /// Override the current instant (RFC 3339)
    #[arg(long)]
    pub now: Option<String>,

    /// Timezone for calendar boundaries (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Target TAT configuration file (JSON)
    #[arg(long)]
    pub targets: Option<PathBuf>,

    /// Restrict TATx scoring to one test name
    #[arg(long)]
    pub test: Option<String>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Write the default targets file if none exists, then exit
    #[arg(long)]
    pub init_targets: bool,
}

impl Settings {
    /// Parse process arguments and resolve `"auto"` values.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::resolve_auto_values(Settings::parse_from(args))
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The injected "now": `--now` when given, the wall clock otherwise.
    pub fn resolve_now(&self) -> Result<DateTime<Utc>> {
        match &self.now {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| TatError::TimestampParse(raw.clone())),
            None => Ok(Utc::now()),
        }
    }

    /// The explicit reporting range, or `None` for "relative to now".
    pub fn resolve_range(
        &self,
        now: DateTime<Utc>,
        calendar: &LocalCalendar,
    ) -> Result<Option<DateRange>> {
        if let Some(last) = &self.last {
            let lookback = parse_lookback(last)?;
            return DateRange::new(now - lookback, now).map(Some);
        }

        match (&self.from, &self.to) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(TatError::Config("--to requires --from".to_string())),
            (Some(from), to) => {
                let first = parse_date(from)?;
                let last = match to {
                    Some(to) => parse_date(to)?,
                    None => calendar.local_date(now),
                };
                DateRange::from_dates(first, last, calendar).map(Some)
            }
        }
    }

    /// Targets file to load: `--targets`, else the default location.
    pub fn targets_path(&self) -> PathBuf {
        self.targets.clone().unwrap_or_else(TatTargets::config_path)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| TatError::Config(format!("invalid date \"{}\", expected YYYY-MM-DD", raw)))
}

/// Parse a relative range such as `"24h"`, `"7d"`, `"2w"` or `"3m"`.
///
/// Months count as 30 days.
pub fn parse_lookback(text: &str) -> Result<Duration> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,5})\s*([hdwm])\s*$").expect("lookback pattern is valid")
    });

    let invalid = || TatError::Config(format!("invalid lookback \"{}\", expected e.g. 7d", text));
    let lowered = text.to_lowercase();
    let caps = re.captures(&lowered).ok_or_else(invalid)?;
    let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }
    Ok(match &caps[2] {
        "h" => Duration::hours(amount),
        "d" => Duration::days(amount),
        "w" => Duration::weeks(amount),
        _ => Duration::days(amount * 30),
    })
}

// ── TatTargets ─────────────────────────────────────────────────────────────────

/// Target turnaround, in minutes, for each priority class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityTargets {
    pub routine: f64,
    pub urgent: f64,
    pub emergency: f64,
}

impl Default for PriorityTargets {
    fn default() -> Self {
        Self {
            routine: 240.0,
            urgent: 120.0,
            emergency: 60.0,
        }
    }
}

impl PriorityTargets {
    pub fn get(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Routine => self.routine,
            Priority::Urgent => self.urgent,
            Priority::Emergency => self.emergency,
        }
    }
}

/// Target TAT configuration, persisted as JSON at
/// `~/.tat-analytics/targets.json`.
///
/// ```json
/// { "default": { "routine": 240, "urgent": 120, "emergency": 60 },
///   "tests": { "CBC": { "routine": 180, "urgent": 90, "emergency": 45 } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TatTargets {
    #[serde(default)]
    pub default: PriorityTargets,
    /// Per-test overrides, matched case-insensitively.
    #[serde(default)]
    pub tests: BTreeMap<String, PriorityTargets>,
}

impl TatTargets {
    /// Return the default path to the targets file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the targets path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".tat-analytics").join("targets.json")
    }

    /// Load targets from `path`, or built-in defaults when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| TatError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let targets: TatTargets = serde_json::from_str(&content)?;
        targets.validate()?;
        Ok(targets)
    }

    /// Write targets to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Every target must be a positive number of minutes.
    pub fn validate(&self) -> Result<()> {
        let all = std::iter::once(("default", &self.default))
            .chain(self.tests.iter().map(|(name, t)| (name.as_str(), t)));
        for (name, targets) in all {
            for priority in Priority::ALL {
                let minutes = targets.get(priority);
                if !minutes.is_finite() || minutes <= 0.0 {
                    return Err(TatError::Config(format!(
                        "target for {} / {} must be a positive number of minutes, got {}",
                        name, priority, minutes
                    )));
                }
            }
        }
        Ok(())
    }

    /// Target minutes for `priority`, using the test's override when present.
    pub fn target_for(&self, test_name: Option<&str>, priority: Priority) -> f64 {
        test_name
            .and_then(|name| {
                self.tests
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
                    .map(|(_, targets)| targets)
            })
            .unwrap_or(&self.default)
            .get(priority)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
