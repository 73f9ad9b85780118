use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single playlist track as supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    /// Release year, parsed from the first four characters of the release date.
    pub year: Option<i32>,
    /// Catalog popularity, 0-100.
    pub popularity: Option<u8>,
    #[serde(flatten)]
    pub audio: AudioFeatures,
}

/// Optional audio descriptors. Each one is independently `None` when the
/// catalog did not (or was not allowed to) provide it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub energy: Option<f64>,
    pub tempo: Option<f64>,
    pub valence: Option<f64>,
    pub danceability: Option<f64>,
}

/// Per-track aggregate built from a listening-history export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub plays: u32,
    pub total_listened_ms: u64,
    /// Latest valid play instant seen in the export.
    pub last_played: Option<DateTime<Utc>>,
    /// Not enforced to be <= plays.
    pub skips: u32,
    pub skip_ms: u64,
}

impl UsageRecord {
    pub fn minutes(&self) -> f64 {
        self.total_listened_ms as f64 / MS_PER_MINUTE
    }

    /// Skip ratio, or `None` when there are no plays to divide by.
    pub fn skip_rate(&self) -> Option<f64> {
        if self.plays == 0 {
            None
        } else {
            Some(self.skips as f64 / self.plays as f64)
        }
    }

    /// Age of the last play in fractional days. Negative for future timestamps.
    pub fn last_played_age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_played
            .map(|ts| (now - ts).num_milliseconds() as f64 / MS_PER_DAY)
    }
}

pub const MS_PER_MINUTE: f64 = 60_000.0;
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// Track id → usage record. Tracks with no history are absent, not zeroed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageIndex {
    records: BTreeMap<String, UsageRecord>,
}

impl UsageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, track_id: &str) -> Option<&UsageRecord> {
        self.records.get(track_id)
    }

    pub fn entry(&mut self, track_id: &str) -> &mut UsageRecord {
        self.records.entry(track_id.to_string()).or_default()
    }

    pub fn insert(&mut self, track_id: impl Into<String>, record: UsageRecord) {
        self.records.insert(track_id.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UsageRecord)> {
        self.records.iter()
    }

    /// Classify a track's history as the three-way state the rules care about.
    pub fn history(&self, track_id: &str) -> History<'_> {
        match self.records.get(track_id) {
            None => History::NoRecord,
            Some(r) if r.plays == 0 => History::Unplayed(r),
            Some(r) => History::Played(r),
        }
    }
}

/// No record is a different state from a record with zero plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum History<'a> {
    NoRecord,
    Unplayed(&'a UsageRecord),
    Played(&'a UsageRecord),
}

impl<'a> History<'a> {
    pub fn record(&self) -> Option<&'a UsageRecord> {
        match *self {
            History::NoRecord => None,
            History::Unplayed(r) | History::Played(r) => Some(r),
        }
    }

    pub fn plays(&self) -> u32 {
        self.record().map(|r| r.plays).unwrap_or(0)
    }
}

/// A labeled, rule-described subset of a playlist's tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub label: String,
    pub description: String,
    pub rule_description: String,
    pub tracks: Vec<Track>,
}

impl Suggestion {
    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }
}

/// A frozen, user-pinned snapshot of a suggestion's selected tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSplit {
    pub playlist_id: String,
    pub suggestion_id: String,
    pub label: String,
    pub rule_description: String,
    pub track_ids: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl SavedSplit {
    pub fn key(&self) -> (&str, &str) {
        (&self.playlist_id, &self.suggestion_id)
    }
}

/// Playlist-level listening statistics. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistHealth {
    pub never_played_pct: u32,
    pub frequently_skipped_pct: u32,
    pub median_plays: u32,
    pub avg_last_play_age_days: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_history_tri_state() {
        let mut index = UsageIndex::new();
        index.insert("zero", UsageRecord::default());
        index.insert("some", UsageRecord { plays: 4, ..Default::default() });

        assert_eq!(index.history("missing"), History::NoRecord);
        assert!(matches!(index.history("zero"), History::Unplayed(_)));
        assert!(matches!(index.history("some"), History::Played(r) if r.plays == 4));
        assert_eq!(index.history("missing").plays(), 0);
    }

    #[test]
    fn test_skip_rate_without_plays() {
        let r = UsageRecord { plays: 0, skips: 5, ..Default::default() };
        assert_eq!(r.skip_rate(), None);
        let r = UsageRecord { plays: 4, skips: 6, ..Default::default() };
        assert_eq!(r.skip_rate(), Some(1.5));
    }

    #[test]
    fn test_minutes_and_age() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let r = UsageRecord {
            plays: 1,
            total_listened_ms: 90_000,
            last_played: Some(Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!((r.minutes() - 1.5).abs() < 1e-9);
        assert!((r.last_played_age_days(now).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_track_json_keeps_null_descriptors() {
        let t = Track {
            id: "abc".into(),
            name: "Song".into(),
            artists: vec!["Band".into()],
            album: "Record".into(),
            year: Some(1999),
            popularity: None,
            audio: AudioFeatures::default(),
        };
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.get("energy").unwrap().is_null());
        assert!(json.get("popularity").unwrap().is_null());
        let back: Track = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }
}
