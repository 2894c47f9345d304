//! The note collection view: raw notes, derived label index, filtered set and
//! the load-more window, kept consistent by one explicit `recompute`.

use std::collections::HashSet;

use bitflags::bitflags;
use time::OffsetDateTime;

use crate::model::Note;
use crate::search::{derive_tag_index, NoteFilter, Tag};

pub mod layout;
pub mod window;

pub use layout::{LayoutMode, TableOptions};
pub use window::LoadMoreWindow;

pub const DEFAULT_ITEMS_PER_LOAD: usize = 8;

bitflags! {
    /// Inputs that changed since the last derivation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Invalidation: u8 {
        const NOTES = 1;
        const QUERY = 1 << 1;
        const LABELS = 1 << 2;
        const LAYOUT = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub struct NoteCollection {
    phase: LoadPhase,
    notes: Vec<Note>,
    tags: Vec<Tag>,
    filter: NoteFilter,
    filtered: Vec<usize>,
    layout: LayoutMode,
    items_per_load: usize,
    window: LoadMoreWindow,
    in_flight: HashSet<i64>,
    loaded_at: Option<OffsetDateTime>,
    last_error: Option<String>,
}

impl NoteCollection {
    pub fn new(layout: LayoutMode, items_per_load: usize) -> Self {
        let items_per_load = items_per_load.max(1);
        Self {
            phase: LoadPhase::Loading,
            notes: Vec::new(),
            tags: Vec::new(),
            filter: NoteFilter::default(),
            filtered: Vec::new(),
            layout,
            items_per_load,
            window: LoadMoreWindow::new(0, layout.page_size(items_per_load)),
            in_flight: HashSet::new(),
            loaded_at: None,
            last_error: None,
        }
    }

    /// A ready collection over `notes`, as if the fetch had just finished.
    pub fn from_notes(notes: Vec<Note>, layout: LayoutMode, items_per_load: usize) -> Self {
        let mut collection = Self::new(layout, items_per_load);
        collection.finish_loading(Ok(notes));
        collection
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn begin_loading(&mut self) {
        self.phase = LoadPhase::Loading;
    }

    /// Applies the outcome of a fetch. On failure the previous notes stay in
    /// place and the error is kept for display.
    pub fn finish_loading(&mut self, result: Result<Vec<Note>, String>) {
        self.phase = LoadPhase::Ready;
        match result {
            Ok(notes) => {
                tracing::debug!(count = notes.len(), "note collection loaded");
                self.notes = notes;
                self.last_error = None;
                self.loaded_at = Some(OffsetDateTime::now_utc());
                self.recompute(Invalidation::NOTES);
            }
            Err(message) => {
                tracing::warn!(%message, "note fetch failed");
                self.last_error = Some(message);
                self.recompute(Invalidation::NOTES);
            }
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, note_id: i64) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == note_id)
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn filter(&self) -> &NoteFilter {
        &self.filter
    }

    pub fn query(&self) -> &str {
        self.filter.query()
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    pub fn window(&self) -> &LoadMoreWindow {
        &self.window
    }

    pub fn loaded_at(&self) -> Option<OffsetDateTime> {
        self.loaded_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn total(&self) -> usize {
        self.notes.len()
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn filtered(&self) -> impl Iterator<Item = &Note> + '_ {
        self.filtered.iter().map(|idx| &self.notes[*idx])
    }

    /// The notes to render: `filtered[0..loaded]`.
    pub fn visible(&self) -> Vec<&Note> {
        self.filtered
            .iter()
            .take(self.window.loaded())
            .map(|idx| &self.notes[*idx])
            .collect()
    }

    pub fn has_more(&self) -> bool {
        self.window.has_more()
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        if self.filter.set_query(query) {
            self.recompute(Invalidation::QUERY);
        }
    }

    pub fn push_query_char(&mut self, ch: char) {
        self.filter.push_query_char(ch);
        self.recompute(Invalidation::QUERY);
    }

    pub fn pop_query_char(&mut self) {
        if self.filter.pop_query_char() {
            self.recompute(Invalidation::QUERY);
        }
    }

    pub fn toggle_label(&mut self, label_id: i64) -> bool {
        let selected = self.filter.toggle_label(label_id);
        self.recompute(Invalidation::LABELS);
        selected
    }

    pub fn clear_labels(&mut self) {
        if self.filter.clear_labels() {
            self.recompute(Invalidation::LABELS);
        }
    }

    pub fn set_layout(&mut self, layout: LayoutMode) {
        if self.layout != layout {
            self.layout = layout;
            self.recompute(Invalidation::LAYOUT);
        }
    }

    pub fn cycle_layout(&mut self) -> LayoutMode {
        self.set_layout(self.layout.next());
        self.layout
    }

    pub fn load_more(&mut self) -> bool {
        self.window.load_more()
    }

    /// Marks a mutation for `note_id` as started. Returns `false` if one is
    /// already in flight, in which case the caller must not send another.
    pub fn begin_mutation(&mut self, note_id: i64) -> bool {
        self.in_flight.insert(note_id)
    }

    pub fn end_mutation(&mut self, note_id: i64) {
        self.in_flight.remove(&note_id);
    }

    pub fn is_mutating(&self, note_id: i64) -> bool {
        self.in_flight.contains(&note_id)
    }

    /// Applies a confirmed (or failed) delete. Only success removes the note.
    pub fn finish_delete(&mut self, note_id: i64, result: Result<(), String>) -> Result<(), String> {
        self.end_mutation(note_id);
        result?;
        let before = self.notes.len();
        self.notes.retain(|note| note.id != note_id);
        if self.notes.len() != before {
            self.recompute(Invalidation::NOTES);
        }
        Ok(())
    }

    fn recompute(&mut self, changed: Invalidation) {
        if changed.is_empty() {
            return;
        }
        if changed.contains(Invalidation::NOTES) {
            self.tags = derive_tag_index(&self.notes);
            let tags = &self.tags;
            // Selected labels nobody carries any more cannot be deselected
            // from the picker, so they are dropped with the tag.
            self.filter
                .retain_labels(|id| tags.iter().any(|tag| tag.label_id == id));
        }
        if changed.intersects(Invalidation::NOTES | Invalidation::QUERY | Invalidation::LABELS) {
            self.filtered = self.filter.positions(&self.notes);
        }
        self.window.reset(
            self.filtered.len(),
            self.layout.page_size(self.items_per_load),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fixtures::{note, numbered, six_notes};

    fn visible_ids(collection: &NoteCollection) -> Vec<i64> {
        collection.visible().iter().map(|note| note.id).collect()
    }

    #[test]
    fn starts_loading_with_nothing_visible() {
        let collection = NoteCollection::new(LayoutMode::Grid, 8);
        assert!(collection.is_loading());
        assert!(collection.visible().is_empty());
    }

    #[test]
    fn selecting_work_label_shows_exactly_work_notes() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 8);
        collection.toggle_label(2);
        assert_eq!(visible_ids(&collection), vec![2, 5]);
        assert_eq!(collection.filtered_len(), 2);
    }

    #[test]
    fn grid_window_grows_by_page_and_stops_at_total() {
        let mut collection = NoteCollection::from_notes(numbered(20), LayoutMode::Grid, 8);
        assert_eq!(collection.visible().len(), 8);
        assert!(collection.load_more());
        assert_eq!(collection.visible().len(), 16);
        assert!(collection.load_more());
        assert_eq!(collection.visible().len(), 20);
        assert!(!collection.load_more());
        assert_eq!(collection.visible().len(), 20);
    }

    #[test]
    fn switching_to_masonry_resets_window_to_sixteen() {
        let mut collection = NoteCollection::from_notes(numbered(20), LayoutMode::Grid, 8);
        assert_eq!(collection.visible().len(), 8);
        collection.set_layout(LayoutMode::Masonry);
        assert_eq!(collection.visible().len(), 16);
        assert!(collection.load_more());
        assert_eq!(collection.visible().len(), 20);
    }

    #[test]
    fn window_resets_after_filter_change() {
        let mut collection = NoteCollection::from_notes(numbered(30), LayoutMode::Grid, 8);
        collection.load_more();
        collection.load_more();
        assert_eq!(collection.visible().len(), 24);
        collection.set_query("note 1");
        // "Note 1" and "Note 10".."Note 19"
        assert_eq!(collection.filtered_len(), 11);
        assert_eq!(collection.visible().len(), 8);
        collection.set_query("");
        assert_eq!(collection.visible().len(), 8);
    }

    #[test]
    fn window_resets_after_label_toggle() {
        let notes = (1..=30)
            .map(|id| {
                let label = if id % 2 == 0 { (2, "even") } else { (1, "odd") };
                note(id, &format!("Note {id}"), "body", Some(label))
            })
            .collect();
        let mut collection = NoteCollection::from_notes(notes, LayoutMode::Grid, 8);
        collection.load_more();
        collection.load_more();
        assert_eq!(collection.visible().len(), 24);

        collection.toggle_label(1);
        assert_eq!(collection.filtered_len(), 15);
        assert_eq!(collection.visible().len(), 8);
        assert!(collection.has_more());

        collection.load_more();
        assert_eq!(collection.visible().len(), 15);
        collection.toggle_label(2);
        assert_eq!(collection.filtered_len(), 30);
        assert_eq!(collection.visible().len(), 8);

        collection.toggle_label(1);
        assert_eq!(collection.filtered_len(), 15);
        assert_eq!(collection.visible().len(), 8);
        assert!(collection.visible().iter().all(|note| note.id % 2 == 0));
    }

    #[test]
    fn window_is_prefix_of_filtered_set() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 2);
        collection.set_query("e");
        let filtered: Vec<i64> = collection.filtered().map(|note| note.id).collect();
        let visible = visible_ids(&collection);
        assert_eq!(visible.len(), filtered.len().min(2));
        assert_eq!(&filtered[..visible.len()], visible.as_slice());
    }

    #[test]
    fn delete_removes_note_everywhere_without_refetch() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 8);
        // note 3 is unlabeled; note 4 is the only "finance" holder
        assert!(collection.begin_mutation(3));
        collection.finish_delete(3, Ok(())).expect("delete applied");
        assert!(collection.note(3).is_none());
        assert!(collection.filtered().all(|note| note.id != 3));

        assert!(collection.begin_mutation(4));
        collection.finish_delete(4, Ok(())).expect("delete applied");
        assert!(collection.tags().iter().all(|tag| tag.label_id != 3));
        assert_eq!(collection.total(), 4);
    }

    #[test]
    fn failed_delete_keeps_note() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 8);
        assert!(collection.begin_mutation(2));
        let result = collection.finish_delete(2, Err("HTTP 500".into()));
        assert_eq!(result, Err("HTTP 500".to_string()));
        assert!(collection.note(2).is_some());
        assert!(!collection.is_mutating(2));
    }

    #[test]
    fn duplicate_mutation_is_rejected_while_in_flight() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 8);
        assert!(collection.begin_mutation(1));
        assert!(!collection.begin_mutation(1));
        collection.end_mutation(1);
        assert!(collection.begin_mutation(1));
    }

    #[test]
    fn fetch_failure_keeps_previous_notes_and_reports() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 8);
        collection.begin_loading();
        collection.finish_loading(Err("connection refused".into()));
        assert!(!collection.is_loading());
        assert_eq!(collection.total(), 6);
        assert_eq!(collection.last_error(), Some("connection refused"));

        let mut fresh = NoteCollection::new(LayoutMode::Grid, 8);
        fresh.finish_loading(Err("connection refused".into()));
        assert_eq!(fresh.total(), 0);
        assert!(fresh.visible().is_empty());
    }

    #[test]
    fn deleting_last_holder_of_selected_label_drops_selection() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 8);
        collection.toggle_label(3);
        assert_eq!(visible_ids(&collection), vec![4]);
        collection.begin_mutation(4);
        collection.finish_delete(4, Ok(())).expect("delete applied");
        assert!(!collection.filter().has_label_selection());
        assert_eq!(collection.filtered_len(), 5);
    }

    #[test]
    fn tag_index_tracks_reloaded_notes() {
        let mut collection = NoteCollection::from_notes(six_notes(), LayoutMode::Grid, 8);
        assert_eq!(collection.tags().len(), 3);
        collection.begin_loading();
        collection.finish_loading(Ok(numbered(3)));
        assert!(collection.tags().is_empty());
        assert_eq!(collection.visible().len(), 3);
    }
}
