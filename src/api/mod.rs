//! Client side of the NeuralNotes REST API.
//!
//! [`NotesBackend`] is the seam the rest of the crate talks to. The HTTP
//! implementation lives in [`http`]; [`memory`] provides an in-process
//! backend used for `--demo` sessions and tests.

use thiserror::Error;

use crate::model::{Folder, FolderCreate, Label, LabelCreate, Note, NoteCreate, NoteUpdate};

pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("server returned HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid API url '{0}'")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Operations the client consumes from the notes service.
///
/// Implementations must be shareable with the background request worker.
pub trait NotesBackend: Send + Sync {
    fn list_notes(&self) -> ApiResult<Vec<Note>>;

    fn get_note(&self, note_id: i64) -> ApiResult<Note>;

    fn create_note(&self, note: &NoteCreate) -> ApiResult<Note>;

    fn update_note(&self, note_id: i64, update: &NoteUpdate) -> ApiResult<Note>;

    fn delete_note(&self, note_id: i64) -> ApiResult<()>;

    fn notes_in_folder(&self, folder_id: i64) -> ApiResult<Vec<Note>>;

    fn list_folders(&self) -> ApiResult<Vec<Folder>>;

    fn create_folder(&self, folder: &FolderCreate) -> ApiResult<Folder>;

    fn list_labels(&self) -> ApiResult<Vec<Label>>;

    fn create_label(&self, label: &LabelCreate) -> ApiResult<Label>;

    fn delete_label(&self, label_id: i64) -> ApiResult<()>;

    /// Sends one message to the assistant endpoint and returns its reply.
    fn chat(&self, message: &str) -> ApiResult<String>;
}
