//! Table reconstruction shared by the Markdown and HTML renderers.
//!
//! Header and body cells live in independent row spaces: header rows are
//! grouped by their own `start_row`, body rows by theirs, and neither is
//! offset by the other. Producers that number body rows after the header
//! rows (continuous indexing) render the same, because only the relative
//! order of `start_row` values matters.

use crate::model::{TableCell, MAX_TABLE_EXTENT};

/// Cells grouped into rendered rows.
#[derive(Debug)]
pub struct TableGrid<'a> {
    pub columns: usize,
    pub header_rows: Vec<Vec<&'a TableCell>>,
    pub body_rows: Vec<Vec<&'a TableCell>>,
}

impl<'a> TableGrid<'a> {
    pub fn new(headers: &'a [TableCell], cells: &'a [TableCell]) -> Self {
        Self {
            columns: column_count(headers, cells),
            header_rows: group_rows(headers),
            body_rows: group_rows(cells),
        }
    }

    /// No headers and no cells: the table has no structure to render.
    pub fn is_empty(&self) -> bool {
        self.header_rows.is_empty() && self.body_rows.is_empty()
    }
}

/// Column count over headers and cells.
///
/// Each cell counts for at least `start_col + 1`, so a producer that leaves
/// `end_col` at zero cannot make its cells fall off the grid. Capped at
/// [`MAX_TABLE_EXTENT`]; cells starting past the cap are not laid out.
pub fn column_count(headers: &[TableCell], cells: &[TableCell]) -> usize {
    headers
        .iter()
        .chain(cells)
        .map(|c| c.end_col.max(c.start_col.saturating_add(1)))
        .max()
        .unwrap_or(0)
        .min(MAX_TABLE_EXTENT)
}

/// Group cells by `start_row` ascending, each row ordered by `start_col`.
pub fn group_rows(cells: &[TableCell]) -> Vec<Vec<&TableCell>> {
    let mut sorted: Vec<&TableCell> = cells.iter().collect();
    sorted.sort_by_key(|c| (c.start_row, c.start_col));

    let mut rows: Vec<Vec<&TableCell>> = Vec::new();
    let mut current: Option<usize> = None;
    for cell in sorted {
        if current != Some(cell.start_row) {
            rows.push(Vec::new());
            current = Some(cell.start_row);
        }
        if let Some(row) = rows.last_mut() {
            row.push(cell);
        }
    }
    rows
}

/// Lay a row out over `columns` slots by `start_col`.
///
/// Uncovered slots stay empty; cells starting in the same slot share it,
/// their texts joined by a space.
pub fn row_slots(row: &[&TableCell], columns: usize) -> Vec<String> {
    let mut slots = vec![String::new(); columns];
    for cell in row {
        let Some(slot) = slots.get_mut(cell.start_col) else {
            continue;
        };
        let text = cell.text().trim();
        if text.is_empty() {
            continue;
        }
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }
    slots
}
