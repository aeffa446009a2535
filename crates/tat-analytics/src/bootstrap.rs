use std::path::{Path, PathBuf};
use tat_core::settings::TatTargets;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI log-level name onto an [`EnvFilter`] directive.
///
/// Accepts the DEBUG/INFO/WARNING/ERROR/CRITICAL names; anything else is
/// passed through as a raw directive.
fn filter_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr so JSON reports on stdout stay machine-readable.
/// Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

/// Default record directory under `home`: `~/.tat-analytics/data/`.
pub fn default_data_path_in(home: &Path) -> PathBuf {
    home.join(".tat-analytics").join("data")
}

/// Locate the record directory when `--data` was not given.
///
/// Returns `None` when `~/.tat-analytics/data/` does not exist.
pub fn discover_data_path() -> Option<PathBuf> {
    discover_data_path_in(&dirs::home_dir()?)
}

pub fn discover_data_path_in(home: &Path) -> Option<PathBuf> {
    Some(default_data_path_in(home)).filter(|p| p.exists())
}

// ── Targets bootstrap ──────────────────────────────────────────────────────────

/// Write the default targets to `path` unless a file is already there.
///
/// Returns `true` when a file was written.
pub fn init_targets(path: &Path) -> anyhow::Result<bool> {
    if path.exists() {
        info!("Targets file already exists: {}", path.display());
        return Ok(false);
    }
    TatTargets::default().save_to(path)?;
    info!("Wrote default targets to {}", path.display());
    Ok(true)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_directive_maps_level_names() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("warning"), "warn");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("tat_data=trace"), "tat_data=trace");
    }

    #[test]
    fn test_discover_data_path_none_when_absent() {
        let tmp = TempDir::new().expect("tempdir");
        assert!(discover_data_path_in(tmp.path()).is_none());
    }

    #[test]
    fn test_discover_data_path_finds_default_dir() {
        let tmp = TempDir::new().expect("tempdir");
        let data = tmp.path().join(".tat-analytics").join("data");
        std::fs::create_dir_all(&data).expect("create data dir");
        assert_eq!(discover_data_path_in(tmp.path()), Some(data));
    }

    #[test]
    fn test_init_targets_writes_once() {
        let tmp = TempDir::new().expect("tempdir");
        let path = TatTargets::config_path_in(tmp.path());

        assert!(init_targets(&path).expect("first write"));
        assert_eq!(
            TatTargets::load_from(&path).expect("load"),
            TatTargets::default()
        );

        // A second call leaves the existing file alone.
        std::fs::write(&path, r#"{"default": {"routine": 200, "urgent": 100, "emergency": 50}}"#)
            .expect("overwrite");
        assert!(!init_targets(&path).expect("second call"));
        assert_eq!(TatTargets::load_from(&path).expect("load").default.routine, 200.0);
    }
}
