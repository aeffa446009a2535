//! Record file discovery and loading.
//!
//! Reads lifecycle exports from a file or a directory tree and decodes them
//! into [`LifecycleRecord`]s. Two layouts are accepted:
//!
//! * `.json` holding an array of records, an object with a `records` array,
//!   or a single record object;
//! * `.jsonl` with one record per line.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tat_core::data_processors::RecordDecoder;
use tat_core::error::{Result, TatError};
use tat_core::models::LifecycleRecord;
use tracing::{debug, warn};

const RECORD_EXTENSIONS: [&str; 2] = ["json", "jsonl"];

/// Everything read from a data path.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    /// Decoded records ordered by request instant; records without one come
    /// first.
    pub records: Vec<LifecycleRecord>,
    pub files: Vec<PathBuf>,
    /// Lines or documents that could not be parsed or decoded.
    pub skipped: usize,
    /// Records dropped because an earlier one carried the same id.
    pub duplicates: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all record files under `data_path`, sorted by path.
///
/// A path naming a single file is returned as-is, whatever its extension.
pub fn find_record_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }
    if data_path.is_file() {
        return vec![data_path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_record_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load and decode every record under `data_path`.
///
/// Unreadable files and malformed documents are logged and skipped. Records
/// sharing a non-empty id are loaded once, first file wins.
pub fn load_records(data_path: &Path, decoder: &RecordDecoder) -> Result<LoadedRecords> {
    if !data_path.exists() {
        return Err(TatError::DataPathNotFound(data_path.to_path_buf()));
    }

    let files = find_record_files(data_path);
    if files.is_empty() {
        warn!("No record files found in {}", data_path.display());
    }

    let mut loaded = LoadedRecords::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for file_path in &files {
        let (documents, unparsable) = match read_documents(file_path) {
            Ok(result) => result,
            Err(e) => {
                warn!("Skipping {}: {}", file_path.display(), e);
                continue;
            }
        };
        loaded.skipped += unparsable;

        let batch = decoder.decode_batch(&documents);
        loaded.skipped += batch.skipped;

        let mut kept = 0usize;
        for record in batch.records {
            if !record.id.is_empty() && !seen_ids.insert(record.id.clone()) {
                debug!("Duplicate record {} in {}", record.id, file_path.display());
                loaded.duplicates += 1;
                continue;
            }
            loaded.records.push(record);
            kept += 1;
        }

        debug!(
            "File {}: {} documents, {} kept, {} unparsable",
            file_path.display(),
            documents.len(),
            kept,
            unparsable
        );
    }

    loaded.records.sort_by_key(LifecycleRecord::instant_of_record);
    loaded.files = files;

    debug!(
        "Loaded {} records from {} files ({} skipped, {} duplicates)",
        loaded.records.len(),
        loaded.files.len(),
        loaded.skipped,
        loaded.duplicates
    );

    Ok(loaded)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_record_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| RECORD_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn is_jsonl(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
}

/// Raw documents in `path` plus the number of unparsable JSONL lines.
fn read_documents(path: &Path) -> Result<(Vec<Value>, usize)> {
    let file_error = |source: std::io::Error| TatError::FileRead {
        path: path.to_path_buf(),
        source,
    };

    if is_jsonl(path) {
        let file = std::fs::File::open(path).map_err(file_error)?;
        let reader = std::io::BufReader::new(file);
        let mut documents = Vec::new();
        let mut unparsable = 0;

        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(file_error)?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(value) => documents.push(value),
                Err(e) => {
                    warn!("{}:{}: invalid JSON: {}", path.display(), number + 1, e);
                    unparsable += 1;
                }
            }
        }
        return Ok((documents, unparsable));
    }

    let content = std::fs::read_to_string(path).map_err(file_error)?;
    let value: Value = serde_json::from_str(&content)?;
    let documents = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(TatError::MalformedRecord {
                    id: None,
                    reason: "\"records\" must be an array".to_string(),
                })
            }
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    };
    Ok((documents, 0))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
