use parking_lot::Mutex;

use super::{ApiError, ApiResult, NotesBackend};
use crate::model::{Folder, FolderCreate, Label, LabelCreate, Note, NoteCreate, NoteUpdate};

/// In-process backend with the same contract as the REST service.
///
/// Used for `--demo` sessions and as the test double for the collection and
/// worker. `set_offline(true)` makes every call fail like a dead server.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    inner: Mutex<MemoryStore>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    notes: Vec<Note>,
    folders: Vec<Folder>,
    labels: Vec<Label>,
    next_note_id: i64,
    next_folder_id: i64,
    next_label_id: i64,
    offline: bool,
}

impl MemoryStore {
    fn check_online(&self) -> ApiResult<()> {
        if self.offline {
            Err(ApiError::Unavailable("offline".into()))
        } else {
            Ok(())
        }
    }

    fn label(&self, label_id: i64) -> ApiResult<Label> {
        self.labels
            .iter()
            .find(|label| label.id == label_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("label {label_id}")))
    }

    fn folder(&self, folder_id: i64) -> ApiResult<Folder> {
        self.folders
            .iter()
            .find(|folder| folder.id == folder_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("folder {folder_id}")))
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: Vec<Note>) -> Self {
        let mut store = MemoryStore::default();
        for note in &notes {
            if let Some(label) = &note.label {
                if !store.labels.iter().any(|known| known.id == label.id) {
                    store.labels.push(label.clone());
                }
            }
            for folder in &note.folders {
                if !store.folders.iter().any(|known| known.id == folder.id) {
                    store.folders.push(folder.clone());
                }
            }
        }
        store.next_note_id = notes.iter().map(|note| note.id).max().unwrap_or(0);
        store.next_label_id = store.labels.iter().map(|l| l.id).max().unwrap_or(0);
        store.next_folder_id = store.folders.iter().map(|f| f.id).max().unwrap_or(0);
        store.notes = notes;
        Self {
            inner: Mutex::new(store),
        }
    }

    /// A small workspace mirroring the sample notes of the design mockup.
    pub fn with_demo_data() -> Self {
        let welcome = Label {
            id: 1,
            name: "welcome".into(),
        };
        let work = Label {
            id: 2,
            name: "work".into(),
        };
        let learning = Label {
            id: 3,
            name: "learning".into(),
        };
        let planning = Label {
            id: 4,
            name: "planning".into(),
        };
        let inbox = Folder {
            id: 1,
            name: "Inbox".into(),
        };
        let projects = Folder {
            id: 2,
            name: "Projects".into(),
        };
        let seed = [
            (
                "Getting Started",
                "Welcome to NeuralNotes! This is your first note.",
                Some(welcome),
                vec![inbox.clone()],
                "2025-05-10",
                "2 hours ago",
                true,
            ),
            (
                "Meeting Notes",
                "Discussed new features for the app including dark mode and offline support.",
                Some(work.clone()),
                vec![projects.clone()],
                "2025-05-12",
                "Yesterday at 3:45 PM",
                false,
            ),
            (
                "Learning Resources",
                "React hooks, TypeScript advanced types, and Tailwind CSS best practices.",
                Some(learning),
                vec![],
                "2025-05-13",
                "3 days ago",
                false,
            ),
            (
                "Weekly Goals",
                "Complete sidebar component, implement notes page, and add search functionality.",
                Some(planning),
                vec![projects.clone()],
                "2025-05-14",
                "2 days ago",
                true,
            ),
            (
                "Book Recommendations",
                "Atomic Habits by James Clear, Deep Work by Cal Newport.",
                None,
                vec![inbox],
                "2025-05-15",
                "5 hours ago",
                false,
            ),
            (
                "Design Inspiration",
                "Check Dribbble and Behance for modern UI design patterns for note-taking apps.",
                Some(work),
                vec![projects],
                "2025-05-15",
                "Just now",
                false,
            ),
        ];
        let notes = seed
            .into_iter()
            .enumerate()
            .map(
                |(idx, (title, content, label, folders, date, edited, starred))| Note {
                    id: idx as i64 + 1,
                    title: title.into(),
                    content: content.into(),
                    owner_id: 1,
                    label_id: label.as_ref().map(|label| label.id),
                    label,
                    folders,
                    date: Some(date.into()),
                    last_edited: Some(edited.into()),
                    is_starred: starred,
                },
            )
            .collect();
        Self::with_notes(notes)
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    pub fn note_count(&self) -> usize {
        self.inner.lock().notes.len()
    }
}

impl NotesBackend for InMemoryBackend {
    fn list_notes(&self) -> ApiResult<Vec<Note>> {
        let store = self.inner.lock();
        store.check_online()?;
        Ok(store.notes.clone())
    }

    fn get_note(&self, note_id: i64) -> ApiResult<Note> {
        let store = self.inner.lock();
        store.check_online()?;
        store
            .notes
            .iter()
            .find(|note| note.id == note_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("note {note_id}")))
    }

    fn create_note(&self, note: &NoteCreate) -> ApiResult<Note> {
        let mut store = self.inner.lock();
        store.check_online()?;
        let label = note.label_id.map(|id| store.label(id)).transpose()?;
        let folders = note
            .folder_id
            .map(|id| store.folder(id))
            .transpose()?
            .into_iter()
            .collect();
        store.next_note_id += 1;
        let created = Note {
            id: store.next_note_id,
            title: note.title.clone(),
            content: note.content.clone(),
            owner_id: 1,
            label_id: note.label_id,
            label,
            folders,
            date: None,
            last_edited: Some("Just now".into()),
            is_starred: false,
        };
        store.notes.push(created.clone());
        Ok(created)
    }

    fn update_note(&self, note_id: i64, update: &NoteUpdate) -> ApiResult<Note> {
        let mut store = self.inner.lock();
        store.check_online()?;
        let label = match update.label_id {
            Some(Some(id)) => Some(Some(store.label(id)?)),
            Some(None) => Some(None),
            None => None,
        };
        let folders = match &update.folder_ids {
            Some(ids) => Some(
                ids.iter()
                    .map(|id| store.folder(*id))
                    .collect::<ApiResult<Vec<_>>>()?,
            ),
            None => None,
        };
        let note = store
            .notes
            .iter_mut()
            .find(|note| note.id == note_id)
            .ok_or_else(|| ApiError::not_found(format!("note {note_id}")))?;
        if let Some(title) = &update.title {
            note.title = title.clone();
        }
        if let Some(content) = &update.content {
            note.content = content.clone();
        }
        if let Some(label) = label {
            note.label_id = label.as_ref().map(|label| label.id);
            note.label = label;
        }
        if let Some(folders) = folders {
            note.folders = folders;
        }
        note.last_edited = Some("Just now".into());
        Ok(note.clone())
    }

    fn delete_note(&self, note_id: i64) -> ApiResult<()> {
        let mut store = self.inner.lock();
        store.check_online()?;
        let before = store.notes.len();
        store.notes.retain(|note| note.id != note_id);
        if store.notes.len() == before {
            return Err(ApiError::not_found(format!("note {note_id}")));
        }
        Ok(())
    }

    fn notes_in_folder(&self, folder_id: i64) -> ApiResult<Vec<Note>> {
        let store = self.inner.lock();
        store.check_online()?;
        store.folder(folder_id)?;
        Ok(store
            .notes
            .iter()
            .filter(|note| note.folders.iter().any(|folder| folder.id == folder_id))
            .cloned()
            .collect())
    }

    fn list_folders(&self) -> ApiResult<Vec<Folder>> {
        let store = self.inner.lock();
        store.check_online()?;
        Ok(store.folders.clone())
    }

    fn create_folder(&self, folder: &FolderCreate) -> ApiResult<Folder> {
        let mut store = self.inner.lock();
        store.check_online()?;
        store.next_folder_id += 1;
        let created = Folder {
            id: store.next_folder_id,
            name: folder.name.clone(),
        };
        store.folders.push(created.clone());
        Ok(created)
    }

    fn list_labels(&self) -> ApiResult<Vec<Label>> {
        let store = self.inner.lock();
        store.check_online()?;
        Ok(store.labels.clone())
    }

    fn create_label(&self, label: &LabelCreate) -> ApiResult<Label> {
        let mut store = self.inner.lock();
        store.check_online()?;
        store.next_label_id += 1;
        let created = Label {
            id: store.next_label_id,
            name: label.name.clone(),
        };
        store.labels.push(created.clone());
        Ok(created)
    }

    fn delete_label(&self, label_id: i64) -> ApiResult<()> {
        let mut store = self.inner.lock();
        store.check_online()?;
        store.label(label_id)?;
        store.labels.retain(|label| label.id != label_id);
        for note in store.notes.iter_mut() {
            if note.label_key() == Some(label_id) {
                note.label = None;
                note.label_id = None;
            }
        }
        Ok(())
    }

    fn chat(&self, message: &str) -> ApiResult<String> {
        let store = self.inner.lock();
        store.check_online()?;
        Ok(format!("(demo assistant) You said: {message}"))
    }
}
