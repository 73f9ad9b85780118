use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{KEY_SAVED_SPLITS, KEY_THRESHOLDS, KEY_USAGE_INDEX, Result, Store};
use crate::models::{SavedSplit, UsageIndex};
use crate::thresholds::{Preset, StoredThresholds, ThresholdState};

impl Store {
    /// Decode the JSON under `key`. Absent, unreadable or corrupt values all
    /// come back as `None`; the latter two are logged.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read '{key}' from store: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring corrupt '{key}' in store: {e}");
                None
            }
        }
    }

    pub fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(key, &raw)
    }

    /// Saved thresholds merged over their preset, or the default state.
    pub fn load_thresholds(&self) -> ThresholdState {
        self.load_thresholds_or(Preset::default())
    }

    /// Like [`load_thresholds`](Self::load_thresholds) with a chosen fallback preset.
    pub fn load_thresholds_or(&self, fallback: Preset) -> ThresholdState {
        self.load_json::<StoredThresholds>(KEY_THRESHOLDS)
            .map(|stored| stored.resolve())
            .unwrap_or_else(|| ThresholdState::from_preset(fallback))
    }

    pub fn save_thresholds(&self, state: &ThresholdState) -> Result<()> {
        self.save_json(KEY_THRESHOLDS, state)
    }

    pub fn load_saved_splits(&self) -> Vec<SavedSplit> {
        self.load_json(KEY_SAVED_SPLITS).unwrap_or_default()
    }

    pub fn save_saved_splits(&self, splits: &[SavedSplit]) -> Result<()> {
        self.save_json(KEY_SAVED_SPLITS, splits)
    }

    pub fn load_usage_index(&self) -> Option<UsageIndex> {
        self.load_json(KEY_USAGE_INDEX)
    }

    /// Replace the stored usage index. There is no merge with the previous one.
    pub fn save_usage_index(&self, index: &UsageIndex) -> Result<()> {
        self.save_json(KEY_USAGE_INDEX, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageRecord;
    use crate::thresholds::ThresholdField;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_threshold_round_trip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.load_thresholds(), ThresholdState::default());
        assert_eq!(
            store.load_thresholds_or(Preset::Aggressive),
            ThresholdState::from_preset(Preset::Aggressive)
        );

        let mut state = ThresholdState::from_preset(Preset::Conservative);
        state.edit(ThresholdField::TouristsMaxMinutes, 4.25);
        store.save_thresholds(&state).unwrap();
        assert_eq!(store.load_thresholds(), state);
    }

    #[test]
    fn test_corrupt_values_fall_back() {
        let store = Store::open_in_memory().unwrap();
        store.put_raw(KEY_THRESHOLDS, "{{{").unwrap();
        store.put_raw(KEY_SAVED_SPLITS, r#"{"not": "a list"}"#).unwrap();
        store.put_raw(KEY_USAGE_INDEX, "[1, 2]").unwrap();

        assert_eq!(store.load_thresholds(), ThresholdState::default());
        assert!(store.load_saved_splits().is_empty());
        assert!(store.load_usage_index().is_none());
    }

    #[test]
    fn test_partial_thresholds_fill_from_preset() {
        let store = Store::open_in_memory().unwrap();
        store
            .put_raw(
                KEY_THRESHOLDS,
                r#"{"preset": "aggressive", "config": {"coreFavorites": {"minPlays": 15}}}"#,
            )
            .unwrap();
        let state = store.load_thresholds();
        assert_eq!(state.preset, Preset::Aggressive);
        assert_eq!(state.config.core_favorites.min_plays, 15.0);
        assert_eq!(state.config.core_favorites.min_minutes, 30.0);
        assert_eq!(state.config.tourists, Preset::Aggressive.config().tourists);
    }

    #[test]
    fn test_usage_index_replaced_wholesale() {
        let store = Store::open_in_memory().unwrap();
        let mut first = UsageIndex::new();
        first.insert("a", UsageRecord { plays: 3, ..Default::default() });
        store.save_usage_index(&first).unwrap();

        let mut second = UsageIndex::new();
        second.insert(
            "b",
            UsageRecord {
                plays: 1,
                last_played: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
                ..Default::default()
            },
        );
        store.save_usage_index(&second).unwrap();

        let loaded = store.load_usage_index().unwrap();
        assert_eq!(loaded, second);
        assert!(loaded.get("a").is_none());
    }
}
