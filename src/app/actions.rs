use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::worker::{BackendWorker, Request};
use crate::model::NoteUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    SelectFirst,
    SelectLast,
    Refresh,
    StartSearch,
    CycleLayout,
    ShowLabelPicker,
    ClearLabels,
    LoadMore,
    Activate,
    ToggleFavorites,
    ToggleRecent,
    RenameNote,
    DeleteNote,
}

fn plain(key: &KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

/// Browse-mode key bindings. Overlay and search input are handled before
/// this is consulted.
pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::Quit)
        }
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::Refresh)
        }
        KeyCode::Down => Some(Action::SelectNext),
        KeyCode::Up => Some(Action::SelectPrevious),
        KeyCode::Home => Some(Action::SelectFirst),
        KeyCode::End => Some(Action::SelectLast),
        KeyCode::Enter => Some(Action::Activate),
        KeyCode::Char(ch) if plain(&key) => match ch {
            'q' => Some(Action::Quit),
            'j' => Some(Action::SelectNext),
            'k' => Some(Action::SelectPrevious),
            'g' => Some(Action::SelectFirst),
            'G' => Some(Action::SelectLast),
            '/' => Some(Action::StartSearch),
            'l' => Some(Action::CycleLayout),
            't' => Some(Action::ShowLabelPicker),
            'T' => Some(Action::ClearLabels),
            'm' => Some(Action::LoadMore),
            'f' => Some(Action::ToggleFavorites),
            'o' => Some(Action::ToggleRecent),
            'r' => Some(Action::RenameNote),
            'd' => Some(Action::DeleteNote),
            _ => None,
        },
        _ => None,
    }
}

/// Turns confirmed user intents into backend requests.
pub struct ActionDispatcher<'a> {
    worker: &'a mut BackendWorker,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(worker: &'a mut BackendWorker) -> Self {
        Self { worker }
    }

    pub fn refresh(&mut self) -> u64 {
        self.worker.submit(Request::FetchNotes)
    }

    pub fn rename_note(&mut self, note_id: i64, title: &str) -> u64 {
        let update = NoteUpdate {
            title: Some(title.to_owned()),
            ..NoteUpdate::default()
        };
        self.worker.submit(Request::UpdateNote { note_id, update })
    }

    pub fn delete_note(&mut self, note_id: i64) -> u64 {
        self.worker.submit(Request::DeleteNote(note_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn browse_keys_map_to_actions() {
        assert_eq!(action_for_key(key(KeyCode::Char('/'))), Some(Action::StartSearch));
        assert_eq!(action_for_key(key(KeyCode::Char('l'))), Some(Action::CycleLayout));
        assert_eq!(action_for_key(key(KeyCode::Char('j'))), Some(Action::SelectNext));
        assert_eq!(action_for_key(key(KeyCode::Up)), Some(Action::SelectPrevious));
        assert_eq!(action_for_key(key(KeyCode::Char('m'))), Some(Action::LoadMore));
        assert_eq!(action_for_key(key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn control_r_refreshes_while_plain_r_renames() {
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert_eq!(action_for_key(ctrl_r), Some(Action::Refresh));
        assert_eq!(action_for_key(key(KeyCode::Char('r'))), Some(Action::RenameNote));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(action_for_key(ctrl_c), Some(Action::Quit));
    }

    #[test]
    fn modified_letters_are_ignored() {
        let alt_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::ALT);
        assert_eq!(action_for_key(alt_d), None);
    }
}
