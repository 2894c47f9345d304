use regex::{Regex, RegexBuilder};

/// Case-insensitive literal matcher for the active search query.
///
/// The query is escaped as a whole, so whitespace and punctuation match
/// themselves, in line with how notes are filtered.
pub fn build_highlight_regex(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Byte ranges of every match of `regex` in `text`.
pub fn match_ranges(text: &str, regex: Option<&Regex>) -> Vec<(usize, usize)> {
    regex
        .map(|regex| {
            regex
                .find_iter(text)
                .map(|mat| (mat.start(), mat.end()))
                .collect()
        })
        .unwrap_or_default()
}
