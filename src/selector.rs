use std::collections::BTreeSet;

use serde::Serialize;

use crate::lang::Tag;
use crate::parser::Row;

/// One rendered variant within a display line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub tag: Tag,
    pub text: String,
}

/// The ordered variants to render for one lyric row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayLine {
    pub cells: Vec<Cell>,
}

/// Compute what to render for each row given the enabled languages.
///
/// Cells within a line always follow `order` (the fixed canonical display
/// order), never the iteration order of the enabled set. Rows that produce no
/// cells are omitted from the output entirely; they are not rendered as empty
/// placeholders.
pub fn select_display(rows: &[Row], enabled: &BTreeSet<Tag>, order: &[Tag]) -> Vec<DisplayLine> {
    let mut lines = Vec::new();

    for row in rows {
        let mut cells = Vec::new();

        for &tag in order {
            if !enabled.contains(&tag) {
                continue;
            }
            if let Some(text) = row.displayable(tag) {
                cells.push(Cell {
                    tag,
                    text: text.to_string(),
                });
            }
        }

        // Fallback: a row with no selected variant still renders its [all]
        // entry, once, as long as at least one language is selected
        if cells.is_empty() && !enabled.is_empty() {
            if let Some(text) = row.displayable(Tag::All) {
                cells.push(Cell {
                    tag: Tag::All,
                    text: text.to_string(),
                });
            }
        }

        if !cells.is_empty() {
            lines.push(DisplayLine { cells });
        }
    }

    lines
}

/// Whether any row has non-blank content for the tag.
///
/// Used by a surrounding UI to gray out toggles for languages a song simply
/// does not carry. Independent of the current selection.
pub fn available(rows: &[Row], tag: Tag) -> bool {
    rows.iter().any(|row| row.displayable(tag).is_some())
}

/// The language tags with any non-blank content in the given rows.
pub fn available_tags(rows: &[Row]) -> BTreeSet<Tag> {
    Tag::LANGUAGES
        .iter()
        .copied()
        .filter(|&tag| available(rows, tag))
        .collect()
}
