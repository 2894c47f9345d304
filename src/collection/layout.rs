//! Arrangement of the visible notes for each layout mode.
//!
//! Everything here is pure: it positions already-windowed notes and never
//! filters or paginates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::model::Note;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LayoutMode {
    #[default]
    Grid,
    Masonry,
    List,
}

impl LayoutMode {
    /// Items revealed per page. The flow layout packs more notes per row, so
    /// it loads twice as many at a time.
    pub fn page_size(self, items_per_load: usize) -> usize {
        match self {
            LayoutMode::Grid | LayoutMode::List => items_per_load,
            LayoutMode::Masonry => items_per_load * 2,
        }
    }

    pub fn next(self) -> Self {
        let mut modes = LayoutMode::iter().cycle().skip_while(|mode| *mode != self);
        modes.nth(1).unwrap_or_default()
    }

    /// Responsive column count for a body `width` cells wide.
    pub fn columns_for_width(self, width: u16) -> usize {
        let steps: &[(u16, usize)] = match self {
            LayoutMode::Grid => &[(160, 4), (120, 3), (80, 2)],
            LayoutMode::Masonry => &[(190, 5), (150, 4), (110, 3), (70, 2)],
            LayoutMode::List => &[],
        };
        steps
            .iter()
            .find(|(min_width, _)| width >= *min_width)
            .map(|(_, columns)| *columns)
            .unwrap_or(1)
    }
}

/// Row-major placement: item `i` goes to row `i / columns`.
pub fn arrange_grid(count: usize, columns: usize) -> Vec<Vec<usize>> {
    let columns = columns.max(1);
    (0..count)
        .collect::<Vec<_>>()
        .chunks(columns)
        .map(<[usize]>::to_vec)
        .collect()
}

/// Flow placement: each item joins the currently shortest column, leftmost
/// on ties. Returns item indices per column.
pub fn arrange_masonry(heights: &[u16], columns: usize) -> Vec<Vec<usize>> {
    let columns = columns.max(1);
    let mut placed = vec![Vec::new(); columns];
    let mut filled = vec![0u32; columns];
    for (idx, height) in heights.iter().enumerate() {
        let target = filled
            .iter()
            .enumerate()
            .min_by_key(|(column, used)| (**used, *column))
            .map(|(column, _)| column)
            .unwrap_or(0);
        placed[target].push(idx);
        filled[target] += u32::from(*height);
    }
    placed
}

/// Options of the tabular list layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableOptions {
    pub favorites_only: bool,
    pub recent_first: bool,
}

impl TableOptions {
    pub fn toggle_favorites(&mut self) -> bool {
        self.favorites_only = !self.favorites_only;
        self.favorites_only
    }

    pub fn toggle_recent(&mut self) -> bool {
        self.recent_first = !self.recent_first;
        self.recent_first
    }
}

/// Approximate recency from the free-text "last edited" label: "just now"
/// first, then anything mentioning hours, then the rest. This is string
/// matching, not a timestamp comparison.
pub fn recency_rank(last_edited: Option<&str>) -> u8 {
    let Some(label) = last_edited else {
        return 2;
    };
    let lowered = label.to_lowercase();
    if lowered.contains("just now") {
        0
    } else if lowered.contains("hour") {
        1
    } else {
        2
    }
}

/// Rows for the list layout: optionally starred notes only, optionally
/// reordered by [`recency_rank`] (stable within a rank).
pub fn table_rows<'a>(notes: &[&'a Note], options: TableOptions) -> Vec<&'a Note> {
    let mut rows: Vec<&Note> = notes
        .iter()
        .copied()
        .filter(|note| !options.favorites_only || note.is_starred)
        .collect();
    if options.recent_first {
        rows.sort_by_key(|note| recency_rank(note.last_edited.as_deref()));
    }
    rows
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::search::fixtures::note;

    #[test]
    fn page_sizes_per_layout() {
        assert_eq!(LayoutMode::Grid.page_size(8), 8);
        assert_eq!(LayoutMode::Masonry.page_size(8), 16);
        assert_eq!(LayoutMode::List.page_size(8), 8);
    }

    #[test]
    fn layout_cycles_and_parses() -> anyhow::Result<()> {
        assert_eq!(LayoutMode::Grid.next(), LayoutMode::Masonry);
        assert_eq!(LayoutMode::Masonry.next(), LayoutMode::List);
        assert_eq!(LayoutMode::List.next(), LayoutMode::Grid);
        assert_eq!(LayoutMode::from_str("masonry")?, LayoutMode::Masonry);
        assert_eq!(LayoutMode::List.to_string(), "list");
        Ok(())
    }

    #[test]
    fn columns_shrink_with_width() {
        assert_eq!(LayoutMode::Grid.columns_for_width(200), 4);
        assert_eq!(LayoutMode::Grid.columns_for_width(90), 2);
        assert_eq!(LayoutMode::Grid.columns_for_width(40), 1);
        assert_eq!(LayoutMode::Masonry.columns_for_width(200), 5);
        assert_eq!(LayoutMode::List.columns_for_width(200), 1);
    }

    #[test]
    fn grid_fills_rows_left_to_right() {
        assert_eq!(
            arrange_grid(5, 2),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
        assert!(arrange_grid(0, 3).is_empty());
    }

    #[test]
    fn masonry_places_into_shortest_column() {
        let placed = arrange_masonry(&[6, 3, 3, 4], 2);
        // 0 -> left (6), 1 and 2 -> right (6), tie at 6/6 goes left.
        assert_eq!(placed, vec![vec![0, 3], vec![1, 2]]);
        let placed = arrange_masonry(&[9, 1, 1, 1], 2);
        assert_eq!(placed, vec![vec![0], vec![1, 2, 3]]);
        let placed = arrange_masonry(&[2, 2, 2], 3);
        assert_eq!(placed, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn recency_heuristic_ranks_labels() {
        assert_eq!(recency_rank(Some("Just now")), 0);
        assert_eq!(recency_rank(Some("5 hours ago")), 1);
        assert_eq!(recency_rank(Some("Yesterday at 3:45 PM")), 2);
        assert_eq!(recency_rank(None), 2);
    }

    #[test]
    fn table_rows_filter_favorites_and_sort_stably() {
        let mut a = note(1, "a", "", None);
        a.last_edited = Some("3 days ago".into());
        a.is_starred = true;
        let mut b = note(2, "b", "", None);
        b.last_edited = Some("2 hours ago".into());
        let mut c = note(3, "c", "", None);
        c.last_edited = Some("Just now".into());
        c.is_starred = true;
        let mut d = note(4, "d", "", None);
        d.last_edited = Some("1 hour ago".into());
        let notes = [&a, &b, &c, &d];

        let ids = |rows: Vec<&Note>| rows.iter().map(|note| note.id).collect::<Vec<_>>();
        assert_eq!(ids(table_rows(&notes, TableOptions::default())), vec![1, 2, 3, 4]);
        let recent = TableOptions {
            recent_first: true,
            ..TableOptions::default()
        };
        assert_eq!(ids(table_rows(&notes, recent)), vec![3, 2, 4, 1]);
        let favorites = TableOptions {
            favorites_only: true,
            recent_first: true,
        };
        assert_eq!(ids(table_rows(&notes, favorites)), vec![3, 1]);
    }
}
