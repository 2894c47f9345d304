use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::collection::layout::table_rows;
use crate::collection::{LayoutMode, NoteCollection, TableOptions};
use crate::config::ViewOptions;
use crate::model::Note;
use crate::search::Tag;

const MAX_TITLE_GRAPHEMES: usize = 120;

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct RenameNoteOverlay {
    pub note_id: i64,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct DeleteNoteOverlay {
    pub note_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct LabelPickerOverlay {
    pub selected_index: usize,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    RenameNote(RenameNoteOverlay),
    DeleteNote(DeleteNoteOverlay),
    LabelPicker(LabelPickerOverlay),
}

/// What the cursor is on: a note row/card, or the trailing "load more" row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Note(i64),
    LoadMore,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub collection: NoteCollection,
    pub selected: usize,
    pub preview_lines: usize,
    pub search: SearchState,
    pub table: TableOptions,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub source: String,
    fetch_generation: Option<u64>,
}

impl AppState {
    pub fn new(view: &ViewOptions, source: impl Into<String>) -> Self {
        Self {
            collection: NoteCollection::new(view.default_layout, view.items_per_load),
            selected: 0,
            preview_lines: usize::from(view.preview_lines),
            search: SearchState::default(),
            table: TableOptions::default(),
            status_message: None,
            overlay: None,
            source: source.into(),
            fetch_generation: None,
        }
    }

    pub fn layout(&self) -> LayoutMode {
        self.collection.layout()
    }

    /// Notes in the order they are drawn: the loaded window, passed through
    /// the table options when the list layout is active.
    pub fn displayed_notes(&self) -> Vec<&Note> {
        let visible = self.collection.visible();
        match self.collection.layout() {
            LayoutMode::List => table_rows(&visible, self.table),
            LayoutMode::Grid | LayoutMode::Masonry => visible,
        }
    }

    /// Number of selectable entries including the load-more row.
    pub fn selectable_len(&self) -> usize {
        self.displayed_notes().len() + usize::from(self.collection.has_more())
    }

    pub fn selection(&self) -> Option<Selection> {
        let notes = self.displayed_notes();
        if let Some(note) = notes.get(self.selected) {
            return Some(Selection::Note(note.id));
        }
        (self.selected == notes.len() && self.collection.has_more()).then_some(Selection::LoadMore)
    }

    pub fn selected_note(&self) -> Option<&Note> {
        match self.selection() {
            Some(Selection::Note(note_id)) => self.collection.note(note_id),
            _ => None,
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.selectable_len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    pub fn select_note_by_id(&mut self, note_id: i64) {
        if let Some(idx) = self
            .displayed_notes()
            .iter()
            .position(|note| note.id == note_id)
        {
            self.selected = idx;
        } else {
            self.normalize_selection();
        }
    }

    fn normalize_selection(&mut self) {
        let len = self.selectable_len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn reset_selection(&mut self) {
        self.selected = 0;
    }

    /// Records the generation of the fetch now in flight; older fetch
    /// responses are ignored from here on.
    pub fn begin_fetch(&mut self, generation: u64) {
        self.fetch_generation = Some(generation);
        self.collection.begin_loading();
    }

    pub fn is_current_fetch(&self, generation: u64) -> bool {
        self.fetch_generation == Some(generation)
    }

    /// Returns `false` when the response belongs to a superseded fetch.
    pub fn apply_fetch(&mut self, generation: u64, result: Result<Vec<Note>, String>) -> bool {
        if !self.is_current_fetch(generation) {
            tracing::debug!(generation, "ignoring stale fetch response");
            return false;
        }
        self.fetch_generation = None;
        let keep = self.selected_note().map(|note| note.id);
        self.collection.finish_loading(result);
        match keep {
            Some(note_id) => self.select_note_by_id(note_id),
            None => self.normalize_selection(),
        }
        true
    }

    pub fn apply_delete(&mut self, note_id: i64, result: Result<(), String>) -> Result<(), String> {
        let outcome = self.collection.finish_delete(note_id, result);
        self.normalize_selection();
        outcome
    }

    pub fn begin_search(&mut self) {
        self.search.active = true;
    }

    pub fn cancel_search(&mut self) {
        self.search.active = false;
        self.collection.set_query("");
        self.reset_selection();
    }

    pub fn finish_search(&mut self) {
        self.search.active = false;
    }

    pub fn push_search_char(&mut self, ch: char) {
        self.collection.push_query_char(ch);
        self.reset_selection();
    }

    pub fn pop_search_char(&mut self) {
        self.collection.pop_query_char();
        self.reset_selection();
    }

    pub fn search_query(&self) -> &str {
        self.collection.query()
    }

    pub fn is_search_active(&self) -> bool {
        self.search.active
    }

    pub fn cycle_layout(&mut self) -> LayoutMode {
        let layout = self.collection.cycle_layout();
        self.reset_selection();
        layout
    }

    /// Reveals the next page and moves the cursor onto its first note.
    pub fn load_more(&mut self) -> bool {
        let first_new = self.collection.window().loaded();
        if !self.collection.load_more() {
            return false;
        }
        if self.collection.layout() != LayoutMode::List
            || (!self.table.favorites_only && !self.table.recent_first)
        {
            self.selected = first_new;
        }
        self.normalize_selection();
        true
    }

    pub fn toggle_favorites(&mut self) -> bool {
        let enabled = self.table.toggle_favorites();
        self.normalize_selection();
        enabled
    }

    pub fn toggle_recent(&mut self) -> bool {
        let enabled = self.table.toggle_recent();
        self.normalize_selection();
        enabled
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayState> {
        self.overlay.as_mut()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn open_rename_note(&mut self) -> bool {
        let Some(note) = self.selected_note() else {
            return false;
        };
        let overlay = RenameNoteOverlay {
            note_id: note.id,
            title: note.title.clone(),
        };
        self.overlay = Some(OverlayState::RenameNote(overlay));
        true
    }

    pub fn open_delete_note(&mut self) -> bool {
        let Some(note) = self.selected_note() else {
            return false;
        };
        let overlay = DeleteNoteOverlay {
            note_id: note.id,
            title: note.title.clone(),
        };
        self.overlay = Some(OverlayState::DeleteNote(overlay));
        true
    }

    pub fn open_label_picker(&mut self) -> bool {
        if self.collection.tags().is_empty() {
            return false;
        }
        self.overlay = Some(OverlayState::LabelPicker(LabelPickerOverlay::default()));
        true
    }

    pub fn rename_note_overlay(&self) -> Option<&RenameNoteOverlay> {
        match self.overlay() {
            Some(OverlayState::RenameNote(ref overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn rename_note_overlay_mut(&mut self) -> Option<&mut RenameNoteOverlay> {
        match self.overlay_mut() {
            Some(OverlayState::RenameNote(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn delete_note_overlay(&self) -> Option<&DeleteNoteOverlay> {
        match self.overlay() {
            Some(OverlayState::DeleteNote(ref overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn label_picker_overlay(&self) -> Option<&LabelPickerOverlay> {
        match self.overlay() {
            Some(OverlayState::LabelPicker(ref overlay)) => Some(overlay),
            _ => None,
        }
    }

    fn label_picker_overlay_mut(&mut self) -> Option<&mut LabelPickerOverlay> {
        match self.overlay_mut() {
            Some(OverlayState::LabelPicker(ref mut overlay)) => Some(overlay),
            _ => None,
        }
    }

    pub fn rename_push_char(&mut self, ch: char) {
        if let Some(draft) = self.rename_note_overlay_mut() {
            if draft.title.graphemes(true).count() < MAX_TITLE_GRAPHEMES {
                draft.title.push(ch);
            }
        }
    }

    pub fn rename_pop_char(&mut self) {
        if let Some(draft) = self.rename_note_overlay_mut() {
            let cut = draft
                .title
                .grapheme_indices(true)
                .next_back()
                .map(|(idx, _)| idx);
            if let Some(idx) = cut {
                draft.title.truncate(idx);
            }
        }
    }

    pub fn label_picker_move(&mut self, delta: isize) {
        let len = self.collection.tags().len();
        if let Some(picker) = self.label_picker_overlay_mut() {
            if len == 0 {
                picker.selected_index = 0;
                return;
            }
            let next = (picker.selected_index as isize + delta).clamp(0, len as isize - 1);
            picker.selected_index = next as usize;
        }
    }

    pub fn label_picker_tag(&self) -> Option<&Tag> {
        let picker = self.label_picker_overlay()?;
        self.collection.tags().get(picker.selected_index)
    }

    /// Toggles the highlighted label in the picker; returns its new state.
    pub fn label_picker_toggle(&mut self) -> Option<(String, bool)> {
        let tag = self.label_picker_tag()?.clone();
        let selected = self.collection.toggle_label(tag.label_id);
        self.reset_selection();
        Some((tag.display_name, selected))
    }

    pub fn clear_label_selection(&mut self) {
        self.collection.clear_labels();
        self.reset_selection();
    }

    /// Short summary for the status line, e.g. `8 of 20 shown (20 match)`.
    pub fn counts_summary(&self) -> String {
        let shown = self.displayed_notes().len();
        let matching = self.collection.filtered_len();
        let total = self.collection.total();
        if matching == total {
            format!("{shown} of {total} shown")
        } else {
            format!("{shown} of {matching} shown ({total} total)")
        }
    }

    pub fn loaded_at(&self) -> Option<OffsetDateTime> {
        self.collection.loaded_at()
    }
}

/// First `lines` non-empty lines of `content`, with an ellipsis when cut.
pub fn build_preview(content: &str, lines: usize) -> Vec<String> {
    if lines == 0 {
        return Vec::new();
    }
    let mut source = content.lines().map(str::trim_end).filter(|line| !line.is_empty());
    let mut collected: Vec<String> = source.by_ref().take(lines).map(str::to_owned).collect();
    if source.next().is_some() {
        match collected.last_mut() {
            Some(last) => last.push_str(" …"),
            None => collected.push("…".to_owned()),
        }
    }
    collected
}
