//! Free-text and label filtering over the loaded note set.
//!
//! The query is matched literally: it is lowercased but never trimmed, so a
//! whitespace-only query only matches notes that contain that whitespace.

use indexmap::IndexSet;

use crate::model::Note;

pub mod tags;

pub use tags::{derive_tag_index, Tag};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    query: String,
    selected_labels: IndexSet<i64>,
}

impl NoteFilter {
    pub fn new(query: impl Into<String>, labels: &[i64]) -> Self {
        Self {
            query: query.into(),
            selected_labels: labels.iter().copied().collect(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) -> bool {
        let query = query.into();
        if query == self.query {
            return false;
        }
        self.query = query;
        true
    }

    pub fn push_query_char(&mut self, ch: char) {
        self.query.push(ch);
    }

    pub fn pop_query_char(&mut self) -> bool {
        self.query.pop().is_some()
    }

    /// Selects `label_id` if absent, deselects it otherwise. Returns whether
    /// the label is selected afterwards.
    pub fn toggle_label(&mut self, label_id: i64) -> bool {
        if self.selected_labels.shift_remove(&label_id) {
            false
        } else {
            self.selected_labels.insert(label_id);
            true
        }
    }

    pub fn clear_labels(&mut self) -> bool {
        let changed = !self.selected_labels.is_empty();
        self.selected_labels.clear();
        changed
    }

    /// Drops selected ids that fail `keep`; returns whether any were removed.
    pub fn retain_labels(&mut self, mut keep: impl FnMut(i64) -> bool) -> bool {
        let before = self.selected_labels.len();
        self.selected_labels.retain(|id| keep(*id));
        before != self.selected_labels.len()
    }

    pub fn selected_labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.selected_labels.iter().copied()
    }

    pub fn is_label_selected(&self, label_id: i64) -> bool {
        self.selected_labels.contains(&label_id)
    }

    pub fn has_label_selection(&self) -> bool {
        !self.selected_labels.is_empty()
    }

    /// True when either predicate narrows the result.
    pub fn is_active(&self) -> bool {
        !self.query.is_empty() || self.has_label_selection()
    }

    /// Positions in `notes` of every note passing both predicates, in order.
    pub fn positions(&self, notes: &[Note]) -> Vec<usize> {
        let needle = self.query.to_lowercase();
        notes
            .iter()
            .enumerate()
            .filter(|(_, note)| self.matches_text(note, &needle) && self.matches_label(note))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn apply(&self, notes: &[Note]) -> Vec<Note> {
        self.positions(notes)
            .into_iter()
            .map(|idx| notes[idx].clone())
            .collect()
    }

    fn matches_text(&self, note: &Note, needle: &str) -> bool {
        needle.is_empty()
            || note.title.to_lowercase().contains(needle)
            || note.content.to_lowercase().contains(needle)
    }

    fn matches_label(&self, note: &Note) -> bool {
        if self.selected_labels.is_empty() {
            return true;
        }
        note.label_key()
            .map(|id| self.selected_labels.contains(&id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Label, Note};

    pub fn note(id: i64, title: &str, content: &str, label: Option<(i64, &str)>) -> Note {
        Note {
            id,
            title: title.into(),
            content: content.into(),
            owner_id: 1,
            label_id: label.map(|(id, _)| id),
            label: label.map(|(id, name)| Label {
                id,
                name: name.into(),
            }),
            folders: Vec::new(),
            date: None,
            last_edited: None,
            is_starred: false,
        }
    }

    /// Six notes, two of them labeled "work" (id 2).
    pub fn six_notes() -> Vec<Note> {
        vec![
            note(1, "Groceries", "milk and eggs", Some((1, "home"))),
            note(2, "Standup", "Sprint review notes", Some((2, "work"))),
            note(3, "Reading list", "Deep Work", None),
            note(4, "Budget", "quarterly numbers", Some((3, "finance"))),
            note(5, "Retro", "what went well", Some((2, "work"))),
            note(6, "Trip", "pack sunscreen", Some((1, "home"))),
        ]
    }

    pub fn numbered(count: i64) -> Vec<Note> {
        (1..=count)
            .map(|id| note(id, &format!("Note {id}"), "body", None))
            .collect()
    }
}
