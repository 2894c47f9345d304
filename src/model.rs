use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DefaultOnNull};

/// Placeholder shown when the backend sends no display date for a note.
pub const NO_DATE: &str = "No Date";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
}

/// A note as returned by `GET /notes/`.
///
/// The backend owns these records; the client keeps a read-through copy.
/// `label` and `folders` are lenient: a missing, `null` or malformed value
/// means "no label" / "no folders" rather than a decode failure.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub content: String,
    #[serde(default)]
    pub owner_id: i64,
    #[serde(default)]
    pub label_id: Option<i64>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub label: Option<Label>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub folders: Vec<Folder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<String>,
    #[serde(default)]
    pub is_starred: bool,
}

impl Note {
    pub fn label_key(&self) -> Option<i64> {
        self.label.as_ref().map(|label| label.id)
    }

    pub fn label_name(&self) -> Option<&str> {
        self.label.as_ref().map(|label| label.name.as_str())
    }

    pub fn display_date(&self) -> &str {
        match self.date.as_deref() {
            Some(date) if !date.is_empty() => date,
            _ => NO_DATE,
        }
    }

    pub fn folder_names(&self) -> Vec<&str> {
        self.folders
            .iter()
            .map(|folder| folder.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteCreate {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<i64>,
}

/// Partial update for `PUT /notes/{id}`. Absent fields are left untouched by
/// the backend; `label_id: Some(None)` clears the label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub label_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_ids: Option<Vec<i64>>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.label_id.is_none()
            && self.folder_ids.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderCreate {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCreate {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub response: String,
}
