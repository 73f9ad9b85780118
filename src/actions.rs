//! Playlist mutations built from suggestions.
//!
//! The crate never talks to the remote service itself. A [`PlaylistMutator`]
//! carries the action out; [`PlanWriter`] records actions as JSON lines for an
//! external uploader.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::models::Suggestion;
use crate::selection::SelectionState;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("nothing selected in '{0}'")]
    EmptySelection(String),
    #[error("playlist update failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlaylistAction {
    /// Create a new playlist holding the tracks, in order.
    Create {
        name: String,
        description: String,
        track_ids: Vec<String>,
    },
    /// Remove the tracks from an existing playlist.
    Remove {
        playlist_id: String,
        track_ids: Vec<String>,
    },
}

impl PlaylistAction {
    /// New playlist from the checked tracks of a suggestion. The name
    /// defaults to "<source name> – <label>".
    pub fn create(
        source_name: &str,
        suggestion: &Suggestion,
        selection: &SelectionState,
        name: Option<&str>,
    ) -> Result<Self, MutationError> {
        let track_ids = selected(suggestion, selection)?;
        Ok(PlaylistAction::Create {
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("{source_name} – {}", suggestion.label)),
            description: format!("{} ({})", suggestion.description, suggestion.rule_description),
            track_ids,
        })
    }

    pub fn remove(
        playlist_id: &str,
        suggestion: &Suggestion,
        selection: &SelectionState,
    ) -> Result<Self, MutationError> {
        Ok(PlaylistAction::Remove {
            playlist_id: playlist_id.to_string(),
            track_ids: selected(suggestion, selection)?,
        })
    }

    pub fn track_ids(&self) -> &[String] {
        match self {
            PlaylistAction::Create { track_ids, .. } | PlaylistAction::Remove { track_ids, .. } => {
                track_ids
            }
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, PlaylistAction::Remove { .. })
    }
}

fn selected(
    suggestion: &Suggestion,
    selection: &SelectionState,
) -> Result<Vec<String>, MutationError> {
    let ids = selection.selected_track_ids(suggestion);
    if ids.is_empty() {
        return Err(MutationError::EmptySelection(suggestion.id.clone()));
    }
    Ok(ids)
}

/// Carries out playlist actions against the remote service.
pub trait PlaylistMutator {
    fn apply(&mut self, action: &PlaylistAction) -> Result<(), MutationError>;
}

/// Writes each action as one JSON line.
pub struct PlanWriter<W: Write> {
    out: W,
}

impl<W: Write> PlanWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PlaylistMutator for PlanWriter<W> {
    fn apply(&mut self, action: &PlaylistAction) -> Result<(), MutationError> {
        let line =
            serde_json::to_string(action).map_err(|e| MutationError::Failed(e.to_string()))?;
        writeln!(self.out, "{line}").map_err(|e| MutationError::Failed(e.to_string()))?;
        log::debug!("Planned {} track(s)", action.track_ids().len());
        Ok(())
    }
}
