//! Working state for one playlist: inputs plus everything derived from them.
//!
//! Derived values (suggestions, health) are recomputed wholesale whenever an
//! input changes, and the per-suggestion selection is reset at the same time.

use chrono::{DateTime, Utc};

use crate::actions::{MutationError, PlaylistAction, PlaylistMutator};
use crate::catalog::{CatalogError, TrackSource};
use crate::health;
use crate::models::{PlaylistHealth, Suggestion, Track, UsageIndex};
use crate::selection::SelectionState;
use crate::suggest;
use crate::thresholds::{EditOutcome, Preset, ThresholdField, ThresholdState};

#[derive(Debug)]
pub struct Session {
    pub playlist_id: String,
    tracks: Vec<Track>,
    usage: Option<UsageIndex>,
    thresholds: ThresholdState,
    now: DateTime<Utc>,
    suggestions: Vec<Suggestion>,
    health: Option<PlaylistHealth>,
    pub selection: SelectionState,
}

impl Session {
    pub fn new(
        playlist_id: impl Into<String>,
        tracks: Vec<Track>,
        usage: Option<UsageIndex>,
        thresholds: ThresholdState,
        now: DateTime<Utc>,
    ) -> Self {
        let mut session = Self {
            playlist_id: playlist_id.into(),
            tracks,
            usage,
            thresholds,
            now,
            suggestions: Vec::new(),
            health: None,
            selection: SelectionState::new(),
        };
        session.recompute();
        session
    }

    /// Fetch the playlist through `source` and build a session around it.
    pub fn load(
        source: &dyn TrackSource,
        playlist_id: &str,
        usage: Option<UsageIndex>,
        thresholds: ThresholdState,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        let tracks = source.playlist_tracks(playlist_id)?;
        Ok(Self::new(playlist_id, tracks, usage, thresholds, now))
    }

    fn recompute(&mut self) {
        self.suggestions = suggest::suggest(
            &self.tracks,
            self.usage.as_ref(),
            &self.thresholds.config,
            self.now,
        );
        self.health = health::summarize(&self.tracks, self.usage.as_ref(), self.now);
        self.selection.reset();
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn usage(&self) -> Option<&UsageIndex> {
        self.usage.as_ref()
    }

    pub fn thresholds(&self) -> &ThresholdState {
        &self.thresholds
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn suggestion(&self, id: &str) -> Option<&Suggestion> {
        self.suggestions.iter().find(|s| s.id == id)
    }

    pub fn health(&self) -> Option<&PlaylistHealth> {
        self.health.as_ref()
    }

    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.recompute();
    }

    /// Swap in a freshly imported index. The old one is dropped, not merged.
    pub fn set_usage(&mut self, usage: Option<UsageIndex>) {
        self.usage = usage;
        self.recompute();
    }

    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
        self.recompute();
    }

    pub fn select_preset(&mut self, preset: Preset) {
        self.thresholds.select_preset(preset);
        self.recompute();
    }

    pub fn edit_threshold(&mut self, field: ThresholdField, raw: &str) -> EditOutcome {
        let outcome = self.thresholds.edit_str(field, raw);
        if outcome == EditOutcome::Applied {
            self.recompute();
        }
        outcome
    }

    /// Toggle one track in a suggestion's selection.
    pub fn toggle_track(&mut self, suggestion_id: &str, track_id: &str) {
        if let Some(s) = self.suggestions.iter().find(|s| s.id == suggestion_id) {
            self.selection.toggle(s, track_id);
        }
    }

    /// Run an action for a suggestion through `mutator`.
    ///
    /// Nothing local changes on failure. After a successful removal the
    /// playlist is re-read from `source` rather than patched in place.
    pub fn apply(
        &mut self,
        action: &PlaylistAction,
        mutator: &mut dyn PlaylistMutator,
        source: &dyn TrackSource,
    ) -> Result<(), MutationError> {
        mutator.apply(action)?;
        if action.is_remove() {
            let tracks = source
                .playlist_tracks(&self.playlist_id)
                .map_err(|e| MutationError::Failed(format!("refetch after removal: {e}")))?;
            self.set_tracks(tracks);
        }
        Ok(())
    }
}
