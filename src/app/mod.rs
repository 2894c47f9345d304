use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::api::NotesBackend;
use crate::collection::LayoutMode;
use crate::config::AppConfig;
use crate::ui;

pub mod actions;
pub mod state;
pub mod worker;

pub use actions::{action_for_key, Action, ActionDispatcher};
pub use state::{AppState, OverlayState, Selection};
pub use worker::{BackendWorker, Outcome, Request, Response};

pub struct App {
    pub config: Arc<AppConfig>,
    state: AppState,
    worker: BackendWorker,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        backend: Arc<dyn NotesBackend>,
        source: impl Into<String>,
    ) -> Result<Self> {
        let worker = BackendWorker::spawn(backend).context("starting backend worker")?;
        let state = AppState::new(&config.view, source);
        let mut app = Self {
            config,
            state,
            worker,
            list_state: ListState::default(),
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        };
        app.request_refresh();
        Ok(app)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        self.worker.cancel();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.selectable_len() > 0 {
                        self.list_state.select(Some(self.state.selected));
                    } else {
                        self.list_state.select(None);
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        for response in self.worker.poll() {
            self.handle_response(response);
        }
    }

    fn handle_response(&mut self, response: Response) {
        let Response {
            generation,
            outcome,
        } = response;
        match outcome {
            Outcome::Notes(result) => {
                let failed = result.is_err();
                let result = result.map_err(|err| {
                    tracing::error!(?err, "failed to fetch notes");
                    format!("Failed to load notes: {err}")
                });
                if self.state.apply_fetch(generation, result) && failed {
                    let message = self.state.collection.last_error().map(str::to_owned);
                    self.state.set_status_message(message);
                }
            }
            Outcome::Deleted { note_id, result } => {
                let result = result.map_err(|err| {
                    tracing::error!(?err, note_id, "failed to delete note");
                    err.to_string()
                });
                match self.state.apply_delete(note_id, result) {
                    Ok(()) => self.state.set_status_message(Some("Note deleted")),
                    Err(_) => self.state.set_status_message(Some("Failed to delete note")),
                }
            }
            Outcome::Updated { note_id, result } => {
                self.state.collection.end_mutation(note_id);
                match result {
                    Ok(note) => {
                        tracing::info!(note_id, title = %note.title, "note renamed");
                        self.state.set_status_message(Some("Note renamed"));
                        self.request_refresh();
                    }
                    Err(err) => {
                        tracing::error!(?err, note_id, "failed to rename note");
                        self.state.set_status_message(Some("Failed to rename note"));
                    }
                }
            }
        }
    }

    fn request_refresh(&mut self) {
        let generation = ActionDispatcher::new(&mut self.worker).refresh();
        self.state.begin_fetch(generation);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_search_active() {
            match key.code {
                KeyCode::Esc => {
                    self.state.cancel_search();
                    return;
                }
                KeyCode::Enter => {
                    self.state.finish_search();
                    return;
                }
                KeyCode::Backspace => {
                    self.state.pop_search_char();
                    return;
                }
                KeyCode::Char(ch)
                    if !key.modifiers.intersects(
                        KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                    ) =>
                {
                    self.state.push_search_char(ch);
                    return;
                }
                _ => {}
            }
        }

        if key.code == KeyCode::Esc && !self.state.search_query().is_empty() {
            self.state.cancel_search();
            return;
        }

        if let Some(action) = action_for_key(key) {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::SelectFirst => self.state.selected = 0,
            Action::SelectLast => self.state.move_selection(isize::MAX / 2),
            Action::Refresh => {
                self.request_refresh();
                self.state.set_status_message(Some("Refreshing notes…"));
            }
            Action::StartSearch => self.state.begin_search(),
            Action::CycleLayout => {
                let layout = self.state.cycle_layout();
                self.state
                    .set_status_message(Some(format!("Layout: {layout}")));
            }
            Action::ShowLabelPicker => {
                if !self.state.open_label_picker() {
                    self.state
                        .set_status_message(Some("No labels in the loaded notes"));
                }
            }
            Action::ClearLabels => {
                self.state.clear_label_selection();
                self.state.set_status_message(Some("Label filter cleared"));
            }
            Action::LoadMore => self.handle_load_more(),
            Action::Activate => {
                if self.state.selection() == Some(Selection::LoadMore) {
                    self.handle_load_more();
                }
            }
            Action::ToggleFavorites => self.handle_table_toggle(true),
            Action::ToggleRecent => self.handle_table_toggle(false),
            Action::RenameNote => self.handle_open_mutation(true),
            Action::DeleteNote => self.handle_open_mutation(false),
        }
    }

    fn handle_load_more(&mut self) {
        if !self.state.load_more() {
            self.state.set_status_message(Some("All matching notes are shown"));
        }
    }

    fn handle_table_toggle(&mut self, favorites: bool) {
        if self.state.layout() != LayoutMode::List {
            self.state
                .set_status_message(Some("Switch to the list layout (l) to use this"));
            return;
        }
        let message = if favorites {
            if self.state.toggle_favorites() {
                "Showing favorites only"
            } else {
                "Showing all notes"
            }
        } else if self.state.toggle_recent() {
            "Most recently edited first"
        } else {
            "Original order"
        };
        self.state.set_status_message(Some(message));
    }

    fn handle_open_mutation(&mut self, rename: bool) {
        let Some(note_id) = self.state.selected_note().map(|note| note.id) else {
            return;
        };
        if self.state.collection.is_mutating(note_id) {
            self.state
                .set_status_message(Some("A change to this note is still in progress"));
            return;
        }
        if rename {
            self.state.open_rename_note();
        } else {
            self.state.open_delete_note();
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::RenameNote(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Rename canceled"));
                    }
                    KeyCode::Enter => self.submit_rename_note(),
                    KeyCode::Backspace => self.state.rename_pop_char(),
                    KeyCode::Char(ch)
                        if !key.modifiers.intersects(
                            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                        ) =>
                    {
                        self.state.rename_push_char(ch);
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::DeleteNote(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => self.submit_delete_note(),
                    _ => {}
                }
                true
            }
            Some(OverlayState::LabelPicker(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('t') => {
                        self.state.close_overlay();
                    }
                    KeyCode::Char('j') | KeyCode::Down => self.state.label_picker_move(1),
                    KeyCode::Char('k') | KeyCode::Up => self.state.label_picker_move(-1),
                    KeyCode::Char(' ') => {
                        if let Some((name, selected)) = self.state.label_picker_toggle() {
                            let verb = if selected { "Filtering by" } else { "Removed" };
                            self.state
                                .set_status_message(Some(format!("{verb} label '{name}'")));
                        }
                    }
                    KeyCode::Char('c') => self.state.clear_label_selection(),
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn submit_rename_note(&mut self) {
        let Some((note_id, title)) = self
            .state
            .rename_note_overlay()
            .map(|draft| (draft.note_id, draft.title.trim().to_string()))
        else {
            return;
        };
        if title.is_empty() {
            self.state.set_status_message(Some("Title cannot be empty"));
            return;
        }
        if !self.state.collection.begin_mutation(note_id) {
            self.state
                .set_status_message(Some("A change to this note is still in progress"));
            return;
        }
        self.state.close_overlay();
        ActionDispatcher::new(&mut self.worker).rename_note(note_id, &title);
        self.state.set_status_message(Some("Renaming…"));
    }

    fn submit_delete_note(&mut self) {
        let Some(note_id) = self.state.delete_note_overlay().map(|draft| draft.note_id) else {
            return;
        };
        self.state.close_overlay();
        if !self.state.collection.begin_mutation(note_id) {
            self.state
                .set_status_message(Some("A change to this note is still in progress"));
            return;
        }
        ActionDispatcher::new(&mut self.worker).delete_note(note_id);
        self.state.set_status_message(Some("Deleting…"));
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
