pub mod api;
pub mod app;
pub mod cli;
pub mod collection;
pub mod config;
pub mod highlight;
pub mod model;
pub mod search;
pub mod ui;

pub use api::{ApiError, HttpBackend, InMemoryBackend, NotesBackend};
pub use collection::{LayoutMode, NoteCollection};
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
