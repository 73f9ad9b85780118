//! Listening-history aggregation.
//!
//! Streaming-history exports come in several shapes: the old account-data
//! export (`msPlayed`, `endTime`, `trackUri`) and the extended export
//! (`ms_played`, `ts`, `spotify_track_uri`, `skipped`). Entries are merged
//! into one [`UsageIndex`] keyed by track id.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

use crate::models::UsageIndex;

/// Prefix identifying a playable track reference.
pub const TRACK_URI_PREFIX: &str = "spotify:track:";

const URI_FIELDS: &[&str] = &["spotify_track_uri", "trackUri", "track_uri", "uri"];
const MS_FIELDS: &[&str] = &["ms_played", "msPlayed", "duration_ms"];
const TS_FIELDS: &[&str] = &["ts", "endTime", "end_time", "played_at"];
const SKIP_FIELD: &str = "skipped";

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("no history file contained a JSON array of play records ({files} file(s) checked); upload the StreamingHistory*.json files from your data export")]
    InputFormat { files: usize },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Fold raw play entries into a usage index.
///
/// Entries without a recognisable track URI are dropped silently. Never fails.
pub fn aggregate<'a, I>(entries: I) -> UsageIndex
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut index = UsageIndex::new();
    let mut dropped = 0usize;

    for entry in entries {
        let Some(track_id) = resolve_track_id(entry) else {
            dropped += 1;
            continue;
        };

        let ms = resolve_ms_played(entry);
        let ts = resolve_timestamp(entry);
        let skipped = matches!(entry.get(SKIP_FIELD), Some(Value::Bool(true)));

        let record = index.entry(track_id);
        record.plays = record.plays.saturating_add(1);
        record.total_listened_ms = record.total_listened_ms.saturating_add(ms);
        if skipped {
            record.skips = record.skips.saturating_add(1);
            record.skip_ms = record.skip_ms.saturating_add(ms);
        }
        if let Some(ts) = ts {
            if record.last_played.is_none_or(|prev| ts > prev) {
                record.last_played = Some(ts);
            }
        }
    }

    log::debug!(
        "Aggregated {} tracks from history ({} entries without a track URI)",
        index.len(),
        dropped
    );
    index
}

/// Parse the contents of several history files and aggregate them.
///
/// Files whose top level is not a JSON array are skipped. If none of them
/// are arrays the whole batch is rejected, so callers keep their previous index.
pub fn aggregate_payloads(payloads: &[(String, String)]) -> Result<UsageIndex, HistoryError> {
    let parsed: Vec<Option<Vec<Value>>> = payloads
        .par_iter()
        .map(|(name, text)| parse_payload(name, text))
        .collect();

    let arrays: Vec<Vec<Value>> = parsed.into_iter().flatten().collect();
    if arrays.is_empty() {
        return Err(HistoryError::InputFormat {
            files: payloads.len(),
        });
    }

    Ok(aggregate(arrays.iter().flatten()))
}

/// Read and aggregate history files from disk. Directories are walked for
/// files named like a streaming-history export.
pub fn import_paths(paths: &[PathBuf]) -> Result<UsageIndex, HistoryError> {
    let files = collect_history_files(paths);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("  [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let mut payloads = Vec::with_capacity(files.len());
    for path in &files {
        let text = std::fs::read_to_string(path).map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })?;
        payloads.push((path.display().to_string(), text));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let index = aggregate_payloads(&payloads)?;
    log::info!(
        "Imported history for {} tracks from {} file(s)",
        index.len(),
        files.len()
    );
    Ok(index)
}

/// Expand directory arguments into export files, keeping explicit files as-is.
pub fn collect_history_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_history_file_name(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            log::debug!("{}: {} history files", path.display(), found.len());
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

// Matches `StreamingHistory0.json`, `StreamingHistory_music_1.json`,
// `Streaming_History_Audio_2019-2021_0.json` and similar.
static HISTORY_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^streaming_?history.*\.json$").unwrap());

fn is_history_file_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| HISTORY_FILE_RE.is_match(name))
}

fn parse_payload(name: &str, text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(entries)) => Some(entries),
        Ok(_) => {
            log::warn!("{name}: top level is not an array, skipping");
            None
        }
        Err(e) => {
            log::warn!("{name}: not valid JSON ({e}), skipping");
            None
        }
    }
}

fn resolve_track_id(entry: &Value) -> Option<&str> {
    let uri = URI_FIELDS
        .iter()
        .find_map(|field| entry.get(*field).and_then(Value::as_str))?;
    uri.strip_prefix(TRACK_URI_PREFIX).filter(|id| !id.is_empty())
}

fn resolve_ms_played(entry: &Value) -> u64 {
    let Some(value) = MS_FIELDS
        .iter()
        .find_map(|field| entry.get(*field).filter(|v| v.is_number()))
    else {
        return 0;
    };

    if let Some(ms) = value.as_u64() {
        return ms;
    }
    match value.as_f64() {
        Some(ms) if ms.is_finite() && ms > 0.0 => ms as u64,
        _ => 0,
    }
}

fn resolve_timestamp(entry: &Value) -> Option<DateTime<Utc>> {
    let raw = TS_FIELDS
        .iter()
        .find_map(|field| entry.get(*field).and_then(Value::as_str))?;
    parse_instant(raw)
}

/// Parse an export timestamp. Naive forms are taken as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
