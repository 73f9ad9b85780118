//! Saved splits: frozen snapshots of a suggestion's selected tracks.

use chrono::{DateTime, Utc};

use crate::models::{SavedSplit, Suggestion};

/// Outcome of [`toggle_saved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Saved,
    Removed,
}

/// Save the suggestion for this playlist, or remove it if already saved.
/// The stored track ids never change after saving.
pub fn toggle_saved(
    splits: &mut Vec<SavedSplit>,
    playlist_id: &str,
    suggestion: &Suggestion,
    selected_track_ids: Vec<String>,
    now: DateTime<Utc>,
) -> Toggled {
    let before = splits.len();
    splits.retain(|s| s.key() != (playlist_id, suggestion.id.as_str()));
    if splits.len() != before {
        log::info!("Removed saved split {playlist_id}/{}", suggestion.id);
        return Toggled::Removed;
    }

    splits.push(SavedSplit {
        playlist_id: playlist_id.to_string(),
        suggestion_id: suggestion.id.clone(),
        label: suggestion.label.clone(),
        rule_description: suggestion.rule_description.clone(),
        track_ids: selected_track_ids,
        saved_at: now,
    });
    log::info!("Saved split {playlist_id}/{}", suggestion.id);
    Toggled::Saved
}

pub fn is_saved(splits: &[SavedSplit], playlist_id: &str, suggestion_id: &str) -> bool {
    splits.iter().any(|s| s.key() == (playlist_id, suggestion_id))
}

/// Saved splits for one playlist, oldest first.
pub fn for_playlist<'a>(splits: &'a [SavedSplit], playlist_id: &str) -> Vec<&'a SavedSplit> {
    let mut found: Vec<&SavedSplit> = splits
        .iter()
        .filter(|s| s.playlist_id == playlist_id)
        .collect();
    found.sort_by_key(|s| s.saved_at);
    found
}
