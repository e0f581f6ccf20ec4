//! Layout areas: one detected region of a page.
//!
//! An [`Area`] holds the fields every region shares (box, label, confidence,
//! extracted text) and an [`AreaKind`] carrying the variant-specific data.
//! Renderers match exhaustively on `AreaKind`, so adding a variant is a
//! compile error everywhere output is produced until it is handled.

use super::Label;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned box with a top-left origin.
///
/// Producers are not required to emit `x0 <= x1` / `y0 <= y1`; use
/// [`BoundingBox::normalised`] before doing geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// The same box with corners swapped so that `x0 <= x1` and `y0 <= y1`.
    pub fn normalised(&self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    pub fn width(&self) -> f64 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y1 - self.y0).abs()
    }
}

/// Largest row or column extent a table may claim. Producers reporting
/// coordinates past this are malformed; renderers never lay out more columns.
pub const MAX_TABLE_EXTENT: usize = 4096;

/// One spanning cell of a table, header or body.
///
/// Row and column ranges are half-open. Nothing here is validated: producers
/// emit gaps, overlaps and `end != start + span`, and the renderers in
/// [`crate::output::table`] cope with all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// `None` when the cell was synthesised from markup rather than detected.
    pub bbox: Option<BoundingBox>,
    pub row_span: usize,
    pub col_span: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub converted: Option<String>,
}

impl TableCell {
    /// A 1×1 cell at `(row, col)` holding `text`.
    pub fn at(row: usize, col: usize, text: impl Into<String>) -> Self {
        Self::spanning(row, col, 1, 1, text)
    }

    /// A cell anchored at `(row, col)` spanning `row_span × col_span`.
    pub fn spanning(
        row: usize,
        col: usize,
        row_span: usize,
        col_span: usize,
        text: impl Into<String>,
    ) -> Self {
        let row_span = row_span.max(1);
        let col_span = col_span.max(1);
        Self {
            bbox: None,
            row_span,
            col_span,
            start_row: row,
            end_row: row.saturating_add(row_span),
            start_col: col,
            end_col: col.saturating_add(col_span),
            converted: Some(text.into()),
        }
    }

    /// Cell text, with `None` read as empty.
    pub fn text(&self) -> &str {
        self.converted.as_deref().unwrap_or("")
    }
}

/// Variant-specific payload of an [`Area`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AreaKind {
    /// A region with no text semantics of its own.
    Plain,
    /// Generic text-bearing region (paragraphs, captions, footers, …).
    Text,
    /// `level` follows linear heading depth: 1 is a title, 2 a section header.
    Heading { level: u8 },
    /// `path` points at the cropped artifact once one has been written.
    Image { path: Option<PathBuf> },
    ListItem,
    Table {
        headers: Vec<TableCell>,
        cells: Vec<TableCell>,
    },
}

/// A detected region of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub bbox: BoundingBox,
    pub label: Label,
    pub confidence: f64,
    pub converted: Option<String>,
    #[serde(flatten)]
    pub kind: AreaKind,
}

impl Area {
    pub fn new(kind: AreaKind, bbox: BoundingBox, label: Label, confidence: f64) -> Self {
        Self {
            bbox,
            label,
            confidence,
            converted: None,
            kind,
        }
    }

    /// Builder-style setter for the extracted text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.converted = Some(text.into());
        self
    }

    /// Extracted text, with `None` read as empty.
    pub fn text(&self) -> &str {
        self.converted.as_deref().unwrap_or("")
    }

    pub fn is_list_item(&self) -> bool {
        matches!(self.kind, AreaKind::ListItem)
    }
}
