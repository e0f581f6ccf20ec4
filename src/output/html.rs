//! HTML rendering.
//!
//! Each page is a fold over its areas with an explicit `list_open` flag in
//! the accumulator: the first list item of a run opens `<ul>`, and anything
//! else (or the end of the page) closes it before emitting its own markup.

use super::table::TableGrid;
use super::OutputGenerator;
use crate::error::FolioError;
use crate::model::{Area, AreaKind, DocumentEntry, DocumentReference, TableCell};

/// HTML generator. With `full` the output is a complete document.
#[derive(Debug, Clone, Copy)]
pub struct HtmlGenerator {
    pub full: bool,
}

impl Default for HtmlGenerator {
    fn default() -> Self {
        Self { full: true }
    }
}

impl HtmlGenerator {
    pub fn fragment() -> Self {
        Self { full: false }
    }

    pub fn render(&self, document: &DocumentReference) -> String {
        let body: String = document.items.iter().map(render_page).collect();
        if self.full {
            format!("<html><body>\n{body}</body></html>\n")
        } else {
            body
        }
    }
}

impl OutputGenerator for HtmlGenerator {
    type Output = String;

    fn convert(
        &self,
        documents: Vec<DocumentReference>,
    ) -> Result<Vec<(DocumentReference, String)>, FolioError> {
        Ok(documents
            .into_iter()
            .map(|d| {
                let html = self.render(&d);
                (d, html)
            })
            .collect())
    }
}

fn render_page(page: &DocumentEntry) -> String {
    let (mut out, list_open) =
        page.layout
            .iter()
            .fold((String::new(), false), |(mut out, list_open), area| {
                match (area.is_list_item(), list_open) {
                    (true, false) => out.push_str("<ul>\n"),
                    (false, true) => out.push_str("</ul>\n"),
                    _ => {}
                }
                out.push_str(&render_area(area));
                out.push('\n');
                (out, area.is_list_item())
            });
    if list_open {
        out.push_str("</ul>\n");
    }
    out
}

fn render_area(area: &Area) -> String {
    let text = escape(area.text().trim());
    match &area.kind {
        AreaKind::Plain | AreaKind::Text => format!("<p>{text}</p>"),
        AreaKind::Heading { level } => {
            let l = (*level).clamp(1, 6);
            format!("<h{l}>{text}</h{l}>")
        }
        AreaKind::ListItem => format!("<li>{text}</li>"),
        AreaKind::Image { path: Some(path) } => {
            format!("<img src=\"{}\" alt=\"\" />", escape(&path.display().to_string()))
        }
        AreaKind::Image { path: None } => "<img alt=\"image\" />".to_string(),
        AreaKind::Table { headers, cells } => render_table(headers, cells, area.text()),
    }
}

/// Render a table with native spans. A table without any cells renders as
/// its own text, unescaped: producers that store HTML there get it back.
pub fn render_table(headers: &[TableCell], cells: &[TableCell], fallback: &str) -> String {
    let grid = TableGrid::new(headers, cells);
    if grid.is_empty() {
        return fallback.to_string();
    }

    let mut out = String::from("<table>");
    if !grid.header_rows.is_empty() {
        out.push_str("<thead>");
        for row in &grid.header_rows {
            push_row(&mut out, row, "th");
        }
        out.push_str("</thead>");
    }
    out.push_str("<tbody>");
    for row in &grid.body_rows {
        push_row(&mut out, row, "td");
    }
    out.push_str("</tbody></table>");
    out
}

fn push_row(out: &mut String, row: &[&TableCell], tag: &str) {
    out.push_str("<tr>");
    for cell in row {
        out.push('<');
        out.push_str(tag);
        if cell.col_span > 1 {
            out.push_str(&format!(" colspan=\"{}\"", cell.col_span));
        }
        if cell.row_span > 1 {
            out.push_str(&format!(" rowspan=\"{}\"", cell.row_span));
        }
        out.push('>');
        out.push_str(&escape(cell.text().trim()));
        out.push_str(&format!("</{tag}>"));
    }
    out.push_str("</tr>");
}

/// Escape text for element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
