use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the TAT analytics crates.
///
/// The engine itself never surfaces these to callers of the statistics
/// functions; they exist at the decoding and configuration edges, where a
/// bad record or file is logged and skipped.
#[derive(Error, Debug)]
pub enum TatError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A record did not have the shape of a lifecycle record.
    #[error("Malformed record{}: {reason}", .id.as_deref().map(|id| format!(" {id}")).unwrap_or_default())]
    MalformedRecord { id: Option<String>, reason: String },

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A date range was requested with its end before its start.
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    /// A timezone name is not a recognised IANA identifier.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The expected data path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the TAT crates.
pub type Result<T> = std::result::Result<T, TatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = TatError::FileRead {
            path: PathBuf::from("/exports/samples.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/exports/samples.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_malformed_record_with_id() {
        let err = TatError::MalformedRecord {
            id: Some("S-001".to_string()),
            reason: "expected a JSON object".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed record S-001: expected a JSON object");
    }

    #[test]
    fn test_error_display_malformed_record_without_id() {
        let err = TatError::MalformedRecord {
            id: None,
            reason: "expected a JSON object".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed record: expected a JSON object");
    }

    #[test]
    fn test_error_display_timestamp_parse() {
        let err = TatError::TimestampParse("yesterday-ish".to_string());
        assert_eq!(err.to_string(), "Invalid timestamp format: yesterday-ish");
    }

    #[test]
    fn test_error_display_invalid_range() {
        let err = TatError::InvalidRange("2024-02-01 is after 2024-01-01".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid date range: 2024-02-01 is after 2024-01-01"
        );
    }

    #[test]
    fn test_error_display_unknown_timezone() {
        let err = TatError::UnknownTimezone("Mars/Olympus".to_string());
        assert_eq!(err.to_string(), "Unknown timezone: Mars/Olympus");
    }

    #[test]
    fn test_error_display_data_path_not_found() {
        let err = TatError::DataPathNotFound(PathBuf::from("/missing/dir"));
        assert_eq!(err.to_string(), "Data path not found: /missing/dir");
    }

    #[test]
    fn test_error_display_config() {
        let err = TatError::Config("targets must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: targets must be positive");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TatError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: TatError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
