use indexmap::IndexMap;

use crate::model::Note;

/// A filter option derived from the labels present in the loaded notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub label_id: i64,
    pub display_name: String,
}

/// One entry per distinct label id referenced by `notes`, in discovery order.
///
/// A label id seen again keeps its first position; the most recently seen
/// name is the one displayed.
pub fn derive_tag_index(notes: &[Note]) -> Vec<Tag> {
    let mut unique: IndexMap<i64, &str> = IndexMap::new();
    for note in notes {
        if let Some(label) = &note.label {
            unique.insert(label.id, label.name.as_str());
        }
    }
    unique
        .into_iter()
        .map(|(label_id, name)| Tag {
            id: label_id.to_string(),
            label_id,
            display_name: name.to_owned(),
        })
        .collect()
}
