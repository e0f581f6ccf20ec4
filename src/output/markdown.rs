//! Markdown rendering.
//!
//! | Area | Markdown |
//! |---|---|
//! | heading | `#`×level, space, text |
//! | list item | `- text` |
//! | image | `![](path)`, or `<image>` without a path |
//! | table | GFM pipe table, or the table's own text if it has no cells |
//! | text / plain | verbatim |
//!
//! Consecutive list items are separated by one newline so they form a single
//! list; every other pair of blocks, and every pair of pages, by a blank line.

use super::table::{row_slots, TableGrid};
use super::OutputGenerator;
use crate::error::FolioError;
use crate::model::{Area, AreaKind, DocumentEntry, DocumentReference, TableCell};

/// Narrowest rendered column; GFM wants at least three dashes.
const MIN_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownGenerator;

impl MarkdownGenerator {
    pub fn render(&self, document: &DocumentReference) -> String {
        document
            .items
            .iter()
            .map(render_page)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl OutputGenerator for MarkdownGenerator {
    type Output = String;

    fn convert(
        &self,
        documents: Vec<DocumentReference>,
    ) -> Result<Vec<(DocumentReference, String)>, FolioError> {
        Ok(documents
            .into_iter()
            .map(|d| {
                let md = self.render(&d);
                (d, md)
            })
            .collect())
    }
}

fn render_page(page: &DocumentEntry) -> String {
    let mut out = String::new();
    let mut previous_list_item = false;
    for area in &page.layout {
        let block = render_area(area);
        if block.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(if previous_list_item && area.is_list_item() {
                "\n"
            } else {
                "\n\n"
            });
        }
        out.push_str(&block);
        previous_list_item = area.is_list_item();
    }
    out
}

fn render_area(area: &Area) -> String {
    let text = area.text().trim();
    match &area.kind {
        AreaKind::Plain | AreaKind::Text => text.to_string(),
        AreaKind::Heading { level } => {
            format!("{} {}", "#".repeat((*level).clamp(1, 6) as usize), text)
        }
        AreaKind::ListItem => format!("- {text}"),
        AreaKind::Image { path: Some(path) } => format!("![]({})", path.display()),
        AreaKind::Image { path: None } => "<image>".to_string(),
        AreaKind::Table { headers, cells } => render_table(headers, cells, area.text()),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn slot_rows(rows: &[Vec<&TableCell>], columns: usize) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| row_slots(r, columns).iter().map(|s| escape_cell(s)).collect())
        .collect()
}

/// Render a GFM pipe table. A table without any cells renders as `fallback`.
pub fn render_table(headers: &[TableCell], cells: &[TableCell], fallback: &str) -> String {
    let grid = TableGrid::new(headers, cells);
    if grid.is_empty() {
        return fallback.to_string();
    }

    let mut header_rows = slot_rows(&grid.header_rows, grid.columns);
    let body_rows = slot_rows(&grid.body_rows, grid.columns);
    if header_rows.is_empty() {
        // GFM requires a header row
        header_rows.push(vec![String::new(); grid.columns]);
    }

    let mut widths = vec![MIN_WIDTH; grid.columns];
    for row in header_rows.iter().chain(&body_rows) {
        for (w, slot) in widths.iter_mut().zip(row) {
            *w = (*w).max(slot.chars().count());
        }
    }

    let line = |row: &[String]| -> String {
        let padded: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(s, &w)| format!("{s:<w$}"))
            .collect();
        format!("| {} |", padded.join(" | "))
    };
    let separator = format!(
        "| {} |",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join(" | ")
    );

    let mut lines: Vec<String> = header_rows.iter().map(|r| line(r)).collect();
    lines.push(separator);
    lines.extend(body_rows.iter().map(|r| line(r)));
    lines.join("\n")
}
