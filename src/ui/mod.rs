use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime, UtcOffset};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use regex::Regex;

use crate::app::state::{build_preview, AppState, OverlayState, Selection};
use crate::collection::layout::{arrange_grid, arrange_masonry};
use crate::collection::LayoutMode;
use crate::highlight::{build_highlight_regex, match_ranges};
use crate::model::Note;

const CARD_CHROME: u16 = 4;

struct Highlight {
    regex: Option<Regex>,
    style: Style,
}

impl Highlight {
    fn for_state(state: &AppState) -> Self {
        Self {
            regex: build_highlight_regex(state.search_query()),
            style: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        }
    }

    fn line(&self, text: &str, base_style: Style) -> Vec<Span<'static>> {
        highlight_line(text, self.regex.as_ref(), self.style, base_style)
    }
}

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.size());

    let highlight = Highlight::for_state(state);

    render_header(frame, state, vertical[0]);
    render_body(frame, state, list_state, &highlight, vertical[1]);

    let status = build_status_line(state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[2]);

    render_overlay(frame, state);
}

fn render_header(frame: &mut Frame, state: &AppState, area: Rect) {
    let search_style = if state.is_search_active() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let mut query = state.search_query().to_string();
    if state.is_search_active() {
        query.push('▌');
    }
    let search_line = Line::from(vec![
        Span::styled("Search: ", search_style.add_modifier(Modifier::BOLD)),
        if query.is_empty() {
            Span::styled("press / to search titles and content", Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(query, search_style)
        },
    ]);

    let filter = state.collection.filter();
    let mut chips = vec![Span::styled("Labels: ", Style::default().add_modifier(Modifier::BOLD))];
    if state.collection.tags().is_empty() {
        chips.push(Span::styled("none", Style::default().fg(Color::DarkGray)));
    }
    for tag in state.collection.tags() {
        let style = if filter.is_label_selected(tag.label_id) {
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        chips.push(Span::styled(format!(" {} ", tag.display_name), style));
        chips.push(Span::raw(" "));
    }

    let header = Paragraph::new(vec![search_line, Line::from(chips)]).block(
        Block::default()
            .title("NeuralNotes")
            .borders(Borders::ALL)
            .border_style(search_style),
    );
    frame.render_widget(header, area);
}

fn render_body(
    frame: &mut Frame,
    state: &AppState,
    list_state: &mut ListState,
    highlight: &Highlight,
    area: Rect,
) {
    let collection = &state.collection;
    let title = format!("Notes · {}", collection.layout());
    let block = Block::default().title(title).borders(Borders::ALL);

    if collection.is_loading() && collection.total() == 0 {
        let paragraph = Paragraph::new("Loading notes…")
            .style(Style::default().fg(Color::Gray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let notes = state.displayed_notes();
    if notes.is_empty() {
        let message = match collection.last_error() {
            Some(error) if collection.total() == 0 => error.to_string(),
            _ if collection.total() == 0 => "No notes yet.".to_string(),
            _ if collection.filter().is_active() => {
                "No notes match the current search or labels.".to_string()
            }
            _ => "No favorite notes in this page.".to_string(),
        };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(Color::Gray))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    match collection.layout() {
        LayoutMode::List => render_table(frame, state, &notes, list_state, highlight, block, area),
        LayoutMode::Grid | LayoutMode::Masonry => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let (cards_area, footer_area) = split_footer(inner, collection.has_more());
            if collection.layout() == LayoutMode::Grid {
                render_grid(frame, state, &notes, highlight, cards_area);
            } else {
                render_masonry(frame, state, &notes, highlight, cards_area);
            }
            if let Some(footer) = footer_area {
                frame.render_widget(load_more_line(state), footer);
            }
        }
    }
}

fn split_footer(area: Rect, has_more: bool) -> (Rect, Option<Rect>) {
    if !has_more || area.height < 2 {
        return (area, None);
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    (chunks[0], Some(chunks[1]))
}

fn load_more_line(state: &AppState) -> Paragraph<'static> {
    let selected = state.selection() == Some(Selection::LoadMore);
    let style = if selected {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let remaining = state.collection.window().remaining();
    Paragraph::new(Line::from(Span::styled(
        format!(" Load more ({remaining} remaining) · m "),
        style,
    )))
}

fn card_is_selected(state: &AppState, note: &Note) -> bool {
    state.selection() == Some(Selection::Note(note.id))
}

fn card_lines(
    note: &Note,
    preview: &[String],
    highlight: &Highlight,
    width: u16,
) -> Vec<Line<'static>> {
    let inner_width = usize::from(width.saturating_sub(2));
    let title = truncate_to_width(&note.title, inner_width);
    let mut lines = vec![Line::from(
        highlight.line(&title, Style::default().add_modifier(Modifier::BOLD)),
    )];

    let mut meta = Vec::new();
    if note.is_starred {
        meta.push(Span::styled("★ ", Style::default().fg(Color::Yellow)));
    }
    if let Some(label) = note.label_name() {
        meta.push(Span::styled(
            format!("#{label} "),
            Style::default().fg(Color::Magenta),
        ));
    }
    meta.push(Span::styled(
        note.display_date().to_string(),
        Style::default().fg(Color::Gray),
    ));
    lines.push(Line::from(meta));

    for line in preview {
        let line = truncate_to_width(line, inner_width);
        lines.push(Line::from(highlight.line(&line, Style::default())));
    }
    lines
}

fn card_block(state: &AppState, note: &Note) -> Block<'static> {
    let border_style = if card_is_selected(state, note) {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else if state.collection.is_mutating(note.id) {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).border_style(border_style)
}

fn render_grid(frame: &mut Frame, state: &AppState, notes: &[&Note], highlight: &Highlight, area: Rect) {
    let columns = LayoutMode::Grid.columns_for_width(area.width);
    let preview_lines = state.preview_lines;
    let card_height = CARD_CHROME.saturating_add(u16::try_from(preview_lines).unwrap_or(u16::MAX));
    let rows = arrange_grid(notes.len(), columns);
    let visible_rows = usize::from((area.height / card_height.max(1)).max(1));
    let selected_row = state.selected.min(notes.len().saturating_sub(1)) / columns;
    let first_row = selected_row.saturating_sub(visible_rows - 1);

    let column_width = area.width / columns as u16;
    for (offset, row) in rows.iter().skip(first_row).take(visible_rows).enumerate() {
        let y = area.y + offset as u16 * card_height;
        if y.saturating_add(card_height) > area.bottom() {
            break;
        }
        for (column, idx) in row.iter().enumerate() {
            let note = notes[*idx];
            let rect = Rect::new(
                area.x + column as u16 * column_width,
                y,
                column_width,
                card_height,
            );
            let preview = build_preview(&note.content, preview_lines);
            let paragraph = Paragraph::new(card_lines(note, &preview, highlight, rect.width))
                .block(card_block(state, note));
            frame.render_widget(paragraph, rect);
        }
    }
}

fn masonry_preview(note: &Note, preview_lines: usize) -> Vec<String> {
    build_preview(&note.content, preview_lines.saturating_mul(2))
}

fn render_masonry(
    frame: &mut Frame,
    state: &AppState,
    notes: &[&Note],
    highlight: &Highlight,
    area: Rect,
) {
    let columns = LayoutMode::Masonry.columns_for_width(area.width);
    let previews: Vec<Vec<String>> = notes
        .iter()
        .map(|note| masonry_preview(note, state.preview_lines))
        .collect();
    let heights: Vec<u16> = previews
        .iter()
        .map(|preview| CARD_CHROME.saturating_add(u16::try_from(preview.len()).unwrap_or(u16::MAX)))
        .collect();
    let placed = arrange_masonry(&heights, columns);

    // Scroll every column by the same amount so the selected card is shown.
    let mut scroll = 0u16;
    for column in &placed {
        let mut top = 0u16;
        for idx in column {
            if *idx == state.selected {
                let bottom = top.saturating_add(heights[*idx]);
                scroll = bottom.saturating_sub(area.height);
            }
            top = top.saturating_add(heights[*idx]);
        }
    }

    let column_width = area.width / columns as u16;
    for (column, indices) in placed.iter().enumerate() {
        let mut top = 0u16;
        for idx in indices {
            let height = heights[*idx];
            let card_top = top;
            top = top.saturating_add(height);
            if card_top < scroll {
                continue;
            }
            let y = area.y.saturating_add(card_top - scroll);
            if y.saturating_add(height) > area.bottom() {
                break;
            }
            let note = notes[*idx];
            let rect = Rect::new(area.x + column as u16 * column_width, y, column_width, height);
            let paragraph = Paragraph::new(card_lines(note, &previews[*idx], highlight, rect.width))
                .block(card_block(state, note));
            frame.render_widget(paragraph, rect);
        }
    }
}

fn render_table(
    frame: &mut Frame,
    state: &AppState,
    notes: &[&Note],
    list_state: &mut ListState,
    highlight: &Highlight,
    block: Block<'_>,
    area: Rect,
) {
    let width = usize::from(area.width.saturating_sub(4));
    let title_width = (width * 2 / 5).max(8);
    let label_width = (width / 6).max(6);
    let folder_width = (width / 5).max(6);

    let mut items: Vec<ListItem> = notes
        .iter()
        .map(|note| {
            let star = if note.is_starred { "★ " } else { "  " };
            let title = pad_to_width(&truncate_to_width(&note.title, title_width), title_width);
            let label = pad_to_width(
                &truncate_to_width(note.label_name().unwrap_or("-"), label_width),
                label_width,
            );
            let folders = note.folder_names().join(", ");
            let folders = pad_to_width(
                &truncate_to_width(if folders.is_empty() { "-" } else { &folders }, folder_width),
                folder_width,
            );
            let edited = note.last_edited.as_deref().unwrap_or(note.display_date());

            let mut spans = vec![Span::styled(star, Style::default().fg(Color::Yellow))];
            spans.extend(highlight.line(&title, Style::default().add_modifier(Modifier::BOLD)));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(label, Style::default().fg(Color::Magenta)));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(folders, Style::default().fg(Color::Gray)));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(edited.to_string(), Style::default().fg(Color::Gray)));
            ListItem::new(Line::from(spans))
        })
        .collect();
    if state.collection.has_more() {
        let remaining = state.collection.window().remaining();
        items.push(ListItem::new(Line::from(Span::styled(
            format!("  Load more ({remaining} remaining)"),
            Style::default().fg(Color::Cyan),
        ))));
    }

    let mut title = String::from("Notes · list");
    if state.table.favorites_only {
        title.push_str(" · favorites");
    }
    if state.table.recent_first {
        title.push_str(" · recent first");
    }
    let list = List::new(items)
        .block(block.title(title))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, area, list_state);
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let collection = &state.collection;
    let mut spans = vec![
        Span::styled(
            state.counts_summary(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Layout: "),
        Span::styled(
            collection.layout().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" | Source: {}", state.source)),
    ];

    if collection.is_loading() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            "Loading…",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ));
    } else if let Some(loaded_at) = state.loaded_at() {
        spans.push(Span::raw(format!(" | Loaded {}", format_time_short(loaded_at))));
    }

    let selected_labels = collection.filter().selected_labels().count();
    if selected_labels > 0 {
        spans.push(Span::raw(format!(" | {selected_labels} label(s)")));
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(message) = &state.status_message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        )));
    } else if let Some(error) = collection.last_error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "/ search • t labels • l layout • m more • f fav • o recent • r rename • d delete • ^R refresh • q quit",
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn format_time_short(dt: OffsetDateTime) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    dt.to_offset(offset)
        .format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut last = 0;
    for (start, end) in match_ranges(text, regex) {
        if start > last {
            spans.push(Span::styled(text[last..start].to_string(), base_style));
        }
        spans.push(Span::styled(text[start..end].to_string(), highlight_style));
        last = end;
    }
    if last < text.len() || spans.is_empty() {
        spans.push(Span::styled(text[last..].to_string(), base_style));
    }
    spans
}

/// Cuts `text` to at most `width` terminal cells, ending in `…` when cut.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w + 1 > width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    out
}

fn pad_to_width(text: &str, width: usize) -> String {
    let used = text.width();
    let mut out = text.to_string();
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
    out
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::RenameNote(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut title_display = draft.title.clone();
            title_display.push('▌');
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Rename Note",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("Note #{}, new title:", draft.note_id),
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
                Line::from(title_display),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter to save • Esc to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("Rename Note")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::DeleteNote(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Delete this note?",
                    Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(draft.title.clone()),
                Line::from(""),
                Line::from(Span::styled(
                    "The note is removed from the server. Enter/y to delete • Esc/n to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("Delete Note")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::LabelPicker(picker)) => {
            let area = centered_rect(40, 50, frame.size());
            frame.render_widget(Clear, area);
            let filter = state.collection.filter();
            let items: Vec<ListItem> = state
                .collection
                .tags()
                .iter()
                .map(|tag| {
                    let mark = if filter.is_label_selected(tag.label_id) {
                        "[x] "
                    } else {
                        "[ ] "
                    };
                    ListItem::new(format!("{mark}{}", tag.display_name))
                })
                .collect();
            let mut list_state = ListState::default();
            list_state.select(Some(picker.selected_index));
            let list = List::new(items)
                .block(
                    Block::default()
                        .title("Labels · space toggle · c clear · Esc close")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .highlight_style(
                    Style::default()
                        .bg(Color::Blue)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("▸ ");
            frame.render_stateful_widget(list, area, &mut list_state);
        }
        None => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::config::ViewOptions;
    use crate::search::fixtures::{numbered, six_notes};

    fn span_texts(spans: &[Span<'static>]) -> Vec<String> {
        spans.iter().map(|span| span.content.to_string()).collect()
    }

    fn ready_state(notes: Vec<Note>, layout: LayoutMode) -> AppState {
        let view = ViewOptions {
            default_layout: layout,
            ..ViewOptions::default()
        };
        let mut state = AppState::new(&view, "test");
        state.begin_fetch(1);
        state.apply_fetch(1, Ok(notes));
        state
    }

    fn rendered(state: &AppState) -> anyhow::Result<String> {
        let mut terminal = Terminal::new(TestBackend::new(120, 40))?;
        let mut list_state = ListState::default();
        terminal.draw(|frame| draw_app(frame, state, &mut list_state))?;
        let buffer = terminal.backend().buffer().clone();
        let text = buffer
            .content()
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }

    #[test]
    fn highlight_is_case_insensitive_literal() {
        let regex = build_highlight_regex("NOTE").expect("regex");
        let spans = highlight_line("Notebook note", Some(&regex), Style::default(), Style::default());
        assert_eq!(span_texts(&spans), vec!["Note", "book ", "note"]);
    }

    #[test]
    fn highlight_without_query_is_single_span() {
        let spans = highlight_line("plain", None, Style::default(), Style::default());
        assert_eq!(span_texts(&spans), vec!["plain"]);
    }

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdefgh", 5), "abcd…");
        assert_eq!(truncate_to_width("日本語テキスト", 6), "日本…");
        assert_eq!(pad_to_width("ab", 4), "ab  ");
    }

    #[test]
    fn grid_shows_window_and_load_more_row() -> anyhow::Result<()> {
        let state = ready_state(numbered(20), LayoutMode::Grid);
        let screen = rendered(&state)?;
        assert!(screen.contains("Note 1"));
        assert!(screen.contains("Load more (12 remaining)"));
        assert!(!screen.contains("Note 9 "));
        Ok(())
    }

    #[test]
    fn list_layout_renders_label_and_date_columns() -> anyhow::Result<()> {
        let state = ready_state(six_notes(), LayoutMode::List);
        let screen = rendered(&state)?;
        assert!(screen.contains("Standup"));
        assert!(screen.contains("work"));
        assert!(screen.contains("No Date"));
        Ok(())
    }

    #[test]
    fn oversized_preview_does_not_overflow_card_height() -> anyhow::Result<()> {
        for layout in [LayoutMode::Grid, LayoutMode::Masonry] {
            let view = ViewOptions {
                default_layout: layout,
                preview_lines: u16::MAX,
                ..ViewOptions::default()
            };
            let mut state = AppState::new(&view, "test");
            state.begin_fetch(1);
            state.apply_fetch(1, Ok(numbered(3)));
            let screen = rendered(&state)?;
            assert!(screen.contains("3 of 3"), "{layout}: {screen}");
        }
        Ok(())
    }

    #[test]
    fn loading_state_is_not_authoritative() -> anyhow::Result<()> {
        let mut state = AppState::new(&ViewOptions::default(), "test");
        state.begin_fetch(1);
        let screen = rendered(&state)?;
        assert!(screen.contains("Loading notes"));
        Ok(())
    }
}
