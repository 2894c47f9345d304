use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use super::Commands;
use crate::api::NotesBackend;
use crate::collection::layout::table_rows;
use crate::collection::{LayoutMode, NoteCollection, TableOptions};
use crate::config::ViewOptions;
use crate::model::{Folder, FolderCreate, Label, LabelCreate, Note, NoteCreate, NoteUpdate};

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Case-insensitive text matched against titles and content
    #[arg(long, short)]
    pub query: Option<String>,
    /// Only notes carrying one of these label ids (repeatable)
    #[arg(long, short)]
    pub label: Vec<i64>,
    /// Layout whose page size is used (defaults to the configured layout)
    #[arg(long, value_enum)]
    pub layout: Option<LayoutMode>,
    /// Number of pages to reveal
    #[arg(long, default_value_t = 1)]
    pub pages: usize,
    /// List layout only: starred notes only
    #[arg(long)]
    pub favorites: bool,
    /// List layout only: most recently edited first
    #[arg(long)]
    pub recent: bool,
}

impl Default for ListArgs {
    fn default() -> Self {
        Self {
            query: None,
            label: Vec::new(),
            layout: None,
            pages: 1,
            favorites: false,
            recent: false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    pub note_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note
    pub title: String,
    /// Provide the note content inline. If omitted, reads from stdin.
    #[arg(long)]
    pub content: Option<String>,
    /// Label id to attach
    #[arg(long)]
    pub label: Option<i64>,
    /// Folder id to file the note under
    #[arg(long)]
    pub folder: Option<i64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    pub note_id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "stdin")]
    pub content: Option<String>,
    /// Read the new content from stdin
    #[arg(long)]
    pub stdin: bool,
    #[arg(long, conflicts_with = "clear_label")]
    pub label: Option<i64>,
    /// Remove the note's label
    #[arg(long)]
    pub clear_label: bool,
    /// Replace folder memberships (repeatable)
    #[arg(long)]
    pub folder: Vec<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    pub note_id: i64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FolderCommand {
    /// List all folders
    List,
    /// Create a folder
    Create { name: String },
    /// List the notes filed under a folder
    Notes { folder_id: i64 },
}

#[derive(Args, Debug, Clone)]
pub struct FolderArgs {
    #[command(subcommand)]
    pub command: FolderCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LabelCommand {
    /// List all labels
    List,
    /// Create a label
    Create { name: String },
    /// Delete a label
    Delete { label_id: i64 },
}

#[derive(Args, Debug, Clone)]
pub struct LabelArgs {
    #[command(subcommand)]
    pub command: LabelCommand,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Message text; multiple words are joined with spaces
    #[arg(required = true)]
    pub message: Vec<String>,
}

/// Runs a non-interactive command and returns what should be printed.
pub fn execute(backend: &dyn NotesBackend, view: &ViewOptions, command: Commands) -> Result<String> {
    match command {
        Commands::Tui => bail!("the interactive client cannot run as a one-shot command"),
        Commands::List(args) => list_notes(backend, view, &args),
        Commands::Show(args) => show_note(backend, args.note_id),
        Commands::New(args) => {
            let content = match args.content.clone() {
                Some(content) => content,
                None => read_stdin()?.unwrap_or_default(),
            };
            new_note(backend, &args, content)
        }
        Commands::Edit(args) => {
            let content = if args.stdin {
                Some(read_stdin()?.unwrap_or_default())
            } else {
                args.content.clone()
            };
            edit_note(backend, &args, content)
        }
        Commands::Delete(args) => delete_note(backend, args.note_id),
        Commands::Folders(args) => folder_command(backend, args.command),
        Commands::Labels(args) => label_command(backend, args.command),
        Commands::Chat(args) => chat(backend, &args),
    }
}

fn list_notes(backend: &dyn NotesBackend, view: &ViewOptions, args: &ListArgs) -> Result<String> {
    let layout = args.layout.unwrap_or(view.default_layout);
    if (args.favorites || args.recent) && layout != LayoutMode::List {
        bail!("--favorites and --recent only apply to --layout list");
    }
    if args.pages == 0 {
        bail!("--pages must be at least 1");
    }

    let notes = backend.list_notes().context("fetching notes")?;
    let mut collection = NoteCollection::from_notes(notes, layout, view.items_per_load);
    if let Some(query) = &args.query {
        collection.set_query(query.as_str());
    }
    for label_id in &args.label {
        if !collection.filter().is_label_selected(*label_id) {
            collection.toggle_label(*label_id);
        }
    }
    for _ in 1..args.pages {
        if !collection.load_more() {
            break;
        }
    }

    let options = TableOptions {
        favorites_only: args.favorites,
        recent_first: args.recent,
    };
    Ok(format_collection(&collection, options))
}

fn format_collection(collection: &NoteCollection, options: TableOptions) -> String {
    let visible = collection.visible();
    let rows = match collection.layout() {
        LayoutMode::List => table_rows(&visible, options),
        LayoutMode::Grid | LayoutMode::Masonry => visible,
    };
    let mut out = String::new();
    if collection.filtered_len() == 0 {
        out.push_str("No matching notes.\n");
        return out;
    }
    let loaded = collection.window().loaded();
    if rows.len() == loaded {
        let _ = writeln!(
            &mut out,
            "Showing {} of {} matching notes ({} total, {} layout)",
            loaded,
            collection.filtered_len(),
            collection.total(),
            collection.layout()
        );
    } else {
        // favorites only narrow the rows that are already loaded
        let _ = writeln!(
            &mut out,
            "Showing {} starred of {} loaded notes ({} matching, {} total, {} layout)",
            rows.len(),
            loaded,
            collection.filtered_len(),
            collection.total(),
            collection.layout()
        );
    }
    out.push('\n');
    for note in rows {
        out.push_str(&format_note_line(note));
    }
    if collection.has_more() {
        let _ = writeln!(
            &mut out,
            "\n… {} more; pass --pages to load more",
            collection.window().remaining()
        );
    }
    out
}

fn format_note_line(note: &Note) -> String {
    let mut headline = format!("#{}  {}", note.id, note.title);
    if note.is_starred {
        headline.push_str("  ★");
    }
    if let Some(label) = note.label_name() {
        let _ = write!(&mut headline, "  [{label}]");
    }
    let mut out = String::new();
    let _ = writeln!(&mut out, "{headline}");
    let edited = note.last_edited.as_deref().unwrap_or(note.display_date());
    let _ = writeln!(&mut out, "    date    {}", edited);
    let folders = note.folder_names();
    if !folders.is_empty() {
        let _ = writeln!(&mut out, "    folders {}", folders.join(", "));
    }
    out
}

fn show_note(backend: &dyn NotesBackend, note_id: i64) -> Result<String> {
    let note = backend
        .get_note(note_id)
        .with_context(|| format!("fetching note {note_id}"))?;
    let mut out = format_note_line(&note);
    out.push('\n');
    out.push_str(&note.content);
    if !note.content.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

fn new_note(backend: &dyn NotesBackend, args: &NewArgs, content: String) -> Result<String> {
    let title = args.title.trim();
    if title.is_empty() {
        bail!("note title cannot be empty");
    }
    let payload = NoteCreate {
        title: title.to_owned(),
        content,
        label_id: args.label,
        folder_id: args.folder,
    };
    let note = backend.create_note(&payload).context("creating note")?;
    Ok(format!("Created note #{} ({})\n", note.id, note.title))
}

fn edit_note(backend: &dyn NotesBackend, args: &EditArgs, content: Option<String>) -> Result<String> {
    let title = match args.title.as_deref().map(str::trim) {
        Some("") => bail!("note title cannot be empty"),
        other => other.map(str::to_owned),
    };
    let label_id = if args.clear_label {
        Some(None)
    } else {
        args.label.map(Some)
    };
    let update = NoteUpdate {
        title,
        content,
        label_id,
        folder_ids: (!args.folder.is_empty()).then(|| args.folder.clone()),
    };
    if update.is_empty() {
        bail!("nothing to update; pass --title, --content, --stdin, --label, --clear-label or --folder");
    }
    let note = backend
        .update_note(args.note_id, &update)
        .with_context(|| format!("updating note {}", args.note_id))?;
    Ok(format!("Updated note #{} ({})\n", note.id, note.title))
}

fn delete_note(backend: &dyn NotesBackend, note_id: i64) -> Result<String> {
    backend
        .delete_note(note_id)
        .with_context(|| format!("deleting note {note_id}"))?;
    Ok(format!("Deleted note #{note_id}\n"))
}

fn folder_command(backend: &dyn NotesBackend, command: FolderCommand) -> Result<String> {
    match command {
        FolderCommand::List => {
            let folders = backend.list_folders().context("listing folders")?;
            Ok(format_folders(&folders))
        }
        FolderCommand::Create { name } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("folder name cannot be empty");
            }
            let folder = backend
                .create_folder(&FolderCreate { name: name.to_owned() })
                .context("creating folder")?;
            Ok(format!("Created folder #{} ({})\n", folder.id, folder.name))
        }
        FolderCommand::Notes { folder_id } => {
            let notes = backend
                .notes_in_folder(folder_id)
                .with_context(|| format!("listing notes in folder {folder_id}"))?;
            if notes.is_empty() {
                return Ok("Folder is empty.\n".to_string());
            }
            Ok(notes.iter().map(format_note_line).collect())
        }
    }
}

fn format_folders(folders: &[Folder]) -> String {
    if folders.is_empty() {
        return "(no folders)\n".to_string();
    }
    let mut out = String::new();
    for folder in folders {
        let _ = writeln!(&mut out, "#{}  {}", folder.id, folder.name);
    }
    out
}

fn label_command(backend: &dyn NotesBackend, command: LabelCommand) -> Result<String> {
    match command {
        LabelCommand::List => {
            let labels = backend.list_labels().context("listing labels")?;
            Ok(format_labels(&labels))
        }
        LabelCommand::Create { name } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("label name cannot be empty");
            }
            let label = backend
                .create_label(&LabelCreate { name: name.to_owned() })
                .context("creating label")?;
            Ok(format!("Created label #{} ({})\n", label.id, label.name))
        }
        LabelCommand::Delete { label_id } => {
            backend
                .delete_label(label_id)
                .with_context(|| format!("deleting label {label_id}"))?;
            Ok(format!("Deleted label #{label_id}\n"))
        }
    }
}

fn format_labels(labels: &[Label]) -> String {
    if labels.is_empty() {
        return "(no labels)\n".to_string();
    }
    let mut out = String::new();
    for label in labels {
        let _ = writeln!(&mut out, "#{}  {}", label.id, label.name);
    }
    out
}

fn chat(backend: &dyn NotesBackend, args: &ChatArgs) -> Result<String> {
    let message = args.message.join(" ");
    if message.trim().is_empty() {
        bail!("message cannot be empty");
    }
    let reply = backend.chat(&message).context("sending chat message")?;
    Ok(format!("{reply}\n"))
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading content from stdin")?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryBackend;

    type TestResult<T = ()> = Result<T>;

    fn list(backend: &InMemoryBackend, args: ListArgs) -> TestResult<String> {
        list_notes(backend, &ViewOptions::default(), &args)
    }

    #[test]
    fn list_filters_by_label_and_query() -> TestResult {
        let backend = InMemoryBackend::with_demo_data();
        let output = list(
            &backend,
            ListArgs {
                label: vec![2],
                ..ListArgs::default()
            },
        )?;
        assert!(output.contains("Meeting Notes"));
        assert!(output.contains("Design Inspiration"));
        assert!(!output.contains("Weekly Goals"));

        let output = list(
            &backend,
            ListArgs {
                query: Some("DEEP WORK".into()),
                ..ListArgs::default()
            },
        )?;
        assert!(output.contains("Showing 1 of 1 matching notes (6 total"));
        assert!(output.contains("Book Recommendations"));
        Ok(())
    }

    #[test]
    fn list_pages_through_window() -> TestResult {
        let notes: Vec<Note> = (1..=20)
            .map(|id| Note {
                id,
                title: format!("Entry {id}"),
                content: String::new(),
                owner_id: 1,
                label_id: None,
                label: None,
                folders: Vec::new(),
                date: None,
                last_edited: None,
                is_starred: false,
            })
            .collect();
        let backend = InMemoryBackend::with_notes(notes);
        let first = list(&backend, ListArgs { pages: 1, ..ListArgs::default() })?;
        assert!(first.contains("Showing 8 of 20"));
        assert!(first.contains("12 more"));
        let all = list(&backend, ListArgs { pages: 5, ..ListArgs::default() })?;
        assert!(all.contains("Showing 20 of 20"));
        assert!(!all.contains("more;"));
        let masonry = list(
            &backend,
            ListArgs {
                layout: Some(LayoutMode::Masonry),
                pages: 1,
                ..ListArgs::default()
            },
        )?;
        assert!(masonry.contains("Showing 16 of 20"));
        Ok(())
    }

    #[test]
    fn list_table_options_require_list_layout() -> TestResult {
        let backend = InMemoryBackend::with_demo_data();
        let result = list(
            &backend,
            ListArgs {
                favorites: true,
                layout: Some(LayoutMode::Grid),
                pages: 1,
                ..ListArgs::default()
            },
        );
        assert!(result.is_err());

        let output = list(
            &backend,
            ListArgs {
                favorites: true,
                recent: true,
                layout: Some(LayoutMode::List),
                pages: 1,
                ..ListArgs::default()
            },
        )?;
        let getting_started = output.find("Getting Started").expect("starred note listed");
        let goals = output.find("Weekly Goals").expect("starred note listed");
        // "2 hours ago" ranks ahead of "2 days ago"
        assert!(getting_started < goals);
        assert!(!output.contains("Meeting Notes"));
        Ok(())
    }

    #[test]
    fn favorites_header_counts_listed_rows() -> TestResult {
        let backend = InMemoryBackend::with_demo_data();
        let output = list(
            &backend,
            ListArgs {
                favorites: true,
                layout: Some(LayoutMode::List),
                pages: 1,
                ..ListArgs::default()
            },
        )?;
        assert!(output.contains("Showing 2 starred of 6 loaded notes (6 matching, 6 total"));
        assert_eq!(output.lines().filter(|line| line.starts_with('#')).count(), 2);
        Ok(())
    }

    #[test]
    fn edit_requires_a_change_and_clears_label() -> TestResult {
        let backend = InMemoryBackend::with_demo_data();
        let empty = EditArgs {
            note_id: 1,
            ..EditArgs::default()
        };
        assert!(edit_note(&backend, &empty, None).is_err());

        let clear = EditArgs {
            note_id: 2,
            clear_label: true,
            ..EditArgs::default()
        };
        let output = edit_note(&backend, &clear, None)?;
        assert_eq!(output, "Updated note #2 (Meeting Notes)\n");
        assert_eq!(backend.get_note(2)?.label, None);
        Ok(())
    }

    #[test]
    fn create_show_and_delete_note() -> TestResult {
        let backend = InMemoryBackend::with_demo_data();
        let args = NewArgs {
            title: "  Groceries ".into(),
            content: None,
            label: Some(4),
            folder: Some(1),
        };
        let output = new_note(&backend, &args, "milk\neggs".into())?;
        assert_eq!(output, "Created note #7 (Groceries)\n");

        let shown = show_note(&backend, 7)?;
        assert!(shown.contains("[planning]"));
        assert!(shown.contains("folders Inbox"));
        assert!(shown.ends_with("milk\neggs\n"));

        assert_eq!(delete_note(&backend, 7)?, "Deleted note #7\n");
        assert!(show_note(&backend, 7).is_err());
        Ok(())
    }

    #[test]
    fn folders_and_labels_round_out_the_api() -> TestResult {
        let backend = InMemoryBackend::with_demo_data();
        let folders = folder_command(&backend, FolderCommand::List)?;
        assert_eq!(folders, "#1  Inbox\n#2  Projects\n");
        let inbox = folder_command(&backend, FolderCommand::Notes { folder_id: 1 })?;
        assert!(inbox.contains("Getting Started"));
        assert!(inbox.contains("Book Recommendations"));
        assert!(!inbox.contains("Meeting Notes"));

        let created = label_command(&backend, LabelCommand::Create { name: "ideas".into() })?;
        assert_eq!(created, "Created label #5 (ideas)\n");
        assert!(label_command(&backend, LabelCommand::List)?.contains("#5  ideas"));
        Ok(())
    }

    #[test]
    fn chat_joins_words() -> TestResult {
        let backend = InMemoryBackend::with_demo_data();
        let reply = chat(
            &backend,
            &ChatArgs {
                message: vec!["hello".into(), "there".into()],
            },
        )?;
        assert!(reply.contains("hello there"));
        Ok(())
    }
}
