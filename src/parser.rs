use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::lang::Tag;

/// One lyric "stanza line": the language variants for one logical lyric
/// line, as grouped by blank-line separation in the source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    entries: BTreeMap<Tag, String>,
}

impl Row {
    /// Raw accumulated text for a tag, if the row has an entry for it.
    ///
    /// An entry can be present but empty (a tag line with no trailing
    /// content); callers that care about displayability should use
    /// `displayable` instead.
    pub fn text(&self, tag: Tag) -> Option<&str> {
        self.entries.get(&tag).map(String::as_str)
    }

    /// Trimmed text for a tag, only when non-blank.
    pub fn displayable(&self, tag: Tag) -> Option<&str> {
        self.text(tag)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Whether the row holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tags present in this row, in canonical order.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.entries.keys().copied()
    }

    // Append content under a tag. Multi-line content under one tag joins
    // with an internal newline; an existing entry joins even when empty.
    fn append(&mut self, tag: Tag, content: &str) {
        match self.entries.get_mut(&tag) {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(content);
            }
            None => {
                self.entries.insert(tag, content.to_string());
            }
        }
    }
}

/// Parser state threaded through the single forward pass.
#[derive(Debug, Default)]
struct ParseState {
    rows: Vec<Row>,
    row: Row,
    current_tag: Option<Tag>,
}

impl ParseState {
    // Row terminator: flush the accumulator if it holds anything, and close
    // the open tag either way (consecutive blank lines are idempotent).
    fn terminate_row(&mut self) {
        if !self.row.is_empty() {
            self.rows.push(std::mem::take(&mut self.row));
        }
        self.current_tag = None;
    }
}

/// Matches `[<tag-text>]<optional content>`.
fn tag_line_pattern() -> &'static Regex {
    static TAG_LINE: OnceLock<Regex> = OnceLock::new();
    TAG_LINE.get_or_init(|| {
        Regex::new(r"^\[([^\]]+)\]\s*(.*)$").expect("tag line pattern should compile")
    })
}

/// Parse tagged lyric text into an ordered sequence of rows.
///
/// Forgiving of malformed input: unknown tags and orphan continuation lines
/// are dropped, never surfaced as errors. Lyric files are hand-authored and
/// a typo must not take down the viewer.
pub fn parse(raw: &str) -> Vec<Row> {
    // Strip a single leading BOM, then normalize CRLF and bare CR to \n
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut state = ParseState::default();

    for raw_line in text.split('\n') {
        // Right-trim only: indentation on the left keeps tag matching intact
        let line = raw_line.trim_end();

        if line.is_empty() {
            state.terminate_row();
            continue;
        }

        if let Some(caps) = tag_line_pattern().captures(line) {
            match Tag::from_alias(&caps[1]) {
                Some(tag) => {
                    let content = caps.get(2).map_or("", |m| m.as_str());
                    state.row.append(tag, content);
                    state.current_tag = Some(tag);
                }
                None => {
                    // Unknown tag: structural no-op. Continuation lines are
                    // dropped until the next tag line or blank line.
                    state.current_tag = None;
                }
            }
        } else if let Some(tag) = state.current_tag {
            state.row.append(tag, line);
        }
    }

    state.terminate_row();
    state.rows
}
