//! Which tracks of each suggestion are checked.
//!
//! A suggestion with no entry is fully selected. State is keyed by suggestion
//! id and must be cleared whenever suggestions are recomputed.

use std::collections::{BTreeSet, HashMap};

use crate::models::Suggestion;

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    checked: HashMap<String, BTreeSet<String>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.checked.clear();
    }

    /// True if the user has not deselected anything in this suggestion.
    pub fn is_untouched(&self, suggestion_id: &str) -> bool {
        !self.checked.contains_key(suggestion_id)
    }

    pub fn is_selected(&self, suggestion_id: &str, track_id: &str) -> bool {
        match self.checked.get(suggestion_id) {
            None => true,
            Some(set) => set.contains(track_id),
        }
    }

    /// Flip one track. The first toggle materialises the full selection.
    pub fn toggle(&mut self, suggestion: &Suggestion, track_id: &str) {
        if !suggestion.tracks.iter().any(|t| t.id == track_id) {
            log::debug!("{} is not part of {}", track_id, suggestion.id);
            return;
        }
        let set = self
            .checked
            .entry(suggestion.id.clone())
            .or_insert_with(|| suggestion.tracks.iter().map(|t| t.id.clone()).collect());
        if !set.remove(track_id) {
            set.insert(track_id.to_string());
        }
    }

    pub fn select_all(&mut self, suggestion: &Suggestion) {
        self.checked.remove(&suggestion.id);
    }

    pub fn select_none(&mut self, suggestion: &Suggestion) {
        self.checked.insert(suggestion.id.clone(), BTreeSet::new());
    }

    /// Track ids to submit, in suggestion order.
    pub fn selected_track_ids(&self, suggestion: &Suggestion) -> Vec<String> {
        match self.checked.get(&suggestion.id) {
            None => suggestion.track_ids(),
            Some(set) => suggestion
                .tracks
                .iter()
                .filter(|t| set.contains(&t.id))
                .map(|t| t.id.clone())
                .collect(),
        }
    }

    pub fn selected_count(&self, suggestion: &Suggestion) -> usize {
        match self.checked.get(&suggestion.id) {
            None => suggestion.tracks.len(),
            Some(set) => suggestion.tracks.iter().filter(|t| set.contains(&t.id)).count(),
        }
    }
}
