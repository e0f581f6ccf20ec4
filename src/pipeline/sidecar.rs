//! Sidecar extractor: layout written by an external detector.
//!
//! Layout models (YOLO-style detectors, Docling, Marker) run out of process
//! and leave one JSON file per page image: `page0.png` → `page0.json`. This
//! extractor reads it and canonicalises the labels through the configured
//! [`Vocabulary`].
//!
//! ## Sidecar format
//!
//! ```json
//! [
//!   {"label": "Title", "bbox": [10, 10, 300, 40], "confidence": 0.97, "text": "Report"},
//!   {"label": "List-item", "bbox": [10, 50, 300, 110], "items": ["one", "two"]},
//!   {"label": "Table", "bbox": [10, 120, 300, 200],
//!    "headers": [{"row": 0, "col": 0, "text": "H1"}],
//!    "cells":   [{"row": 0, "col": 0, "col_span": 2, "text": "A"}]}
//! ]
//! ```
//!
//! A block with `items` is one list whose items have no boxes of their own;
//! each item gets an equal band of the block's height.

use crate::canonical::{build_area, Vocabulary};
use crate::error::StageError;
use crate::model::{Area, AreaKind, BoundingBox, DocumentEntry, Label, TableCell, MAX_TABLE_EXTENT};
use crate::pipeline::extract::Extractor;
use crate::pipeline::page_text;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads `<page>.json` next to each page image.
#[derive(Debug, Clone, Copy)]
pub struct SidecarExtractor {
    pub vocabulary: Vocabulary,
}

impl SidecarExtractor {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }
}

impl Default for SidecarExtractor {
    fn default() -> Self {
        Self::new(Vocabulary::Generic)
    }
}

/// Path of the layout file for a page image.
pub fn sidecar_path(page: &Path) -> PathBuf {
    page.with_extension("json")
}

#[async_trait]
impl Extractor for SidecarExtractor {
    fn name(&self) -> &str {
        "sidecar"
    }

    async fn extract(&self, mut entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
        let path = sidecar_path(&entry.path);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StageError::artifact(&path, e))?;
        let blocks: Vec<SidecarBlock> = serde_json::from_str(&raw)
            .map_err(|e| StageError::malformed(format!("{}: {e}", path.display())))?;

        let page_dir = entry.path.parent().unwrap_or_else(|| Path::new("."));
        let areas = blocks
            .into_iter()
            .map(|b| b.into_areas(self.vocabulary, page_dir))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StageError::malformed(format!("{}: {e}", path.display())))?;
        entry.layout = areas.into_iter().flatten().collect();
        entry.converted = Some(page_text(&entry.layout));
        debug!(
            "{}: {} areas from {}",
            entry.path.display(),
            entry.layout.len(),
            path.display()
        );
        Ok(entry)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────────

fn one() -> f64 {
    1.0
}

fn single_span() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct SidecarCell {
    row: usize,
    col: usize,
    #[serde(default = "single_span")]
    row_span: usize,
    #[serde(default = "single_span")]
    col_span: usize,
    #[serde(default)]
    text: String,
}

impl SidecarCell {
    fn into_cell(self) -> Result<TableCell, String> {
        let extent = [self.row, self.col, self.row_span, self.col_span];
        if extent.iter().any(|&v| v > MAX_TABLE_EXTENT) {
            return Err(format!(
                "table cell at row {} col {} exceeds {MAX_TABLE_EXTENT} rows or columns",
                self.row, self.col
            ));
        }
        Ok(TableCell::spanning(self.row, self.col, self.row_span, self.col_span, self.text))
    }
}

#[derive(Debug, Deserialize)]
struct SidecarBlock {
    label: String,
    bbox: [f64; 4],
    #[serde(default = "one")]
    confidence: f64,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    level: Option<u8>,
    #[serde(default)]
    image: Option<PathBuf>,
    #[serde(default)]
    headers: Vec<SidecarCell>,
    #[serde(default)]
    cells: Vec<SidecarCell>,
    #[serde(default)]
    items: Option<Vec<String>>,
}

impl SidecarBlock {
    fn into_areas(self, vocabulary: Vocabulary, page_dir: &Path) -> Result<Vec<Area>, String> {
        let [x0, y0, x1, y1] = self.bbox;
        let bbox = BoundingBox::new(x0, y0, x1, y1);

        if let Some(items) = self.items {
            return Ok(list_items(&items, bbox, self.confidence));
        }

        let mut area = build_area(vocabulary, &self.label, bbox, self.confidence);
        if area.label == Label::ListItem {
            area.kind = AreaKind::ListItem;
        }
        match &mut area.kind {
            AreaKind::Heading { level } => {
                if let Some(l) = self.level {
                    *level = l.clamp(1, 6);
                }
            }
            AreaKind::Table { headers, cells } => {
                *headers = self
                    .headers
                    .into_iter()
                    .map(SidecarCell::into_cell)
                    .collect::<Result<_, _>>()?;
                *cells = self
                    .cells
                    .into_iter()
                    .map(SidecarCell::into_cell)
                    .collect::<Result<_, _>>()?;
            }
            AreaKind::Image { path } => {
                *path = self.image.map(|p| page_dir.join(p));
            }
            _ => {}
        }
        area.converted = self.text;
        Ok(vec![area])
    }
}

/// Split a list block into one area per item, slicing the box vertically.
fn list_items(items: &[String], bbox: BoundingBox, confidence: f64) -> Vec<Area> {
    let n = items.len() as f64;
    let step = (bbox.y1 - bbox.y0) / n;
    items
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let item_box = BoundingBox::new(
                bbox.x0,
                bbox.y0 + i as f64 * step,
                bbox.x1,
                bbox.y0 + (i + 1) as f64 * step,
            );
            Area::new(AreaKind::ListItem, item_box, Label::ListItem, confidence.clamp(0.0, 1.0))
                .with_text(text.as_str())
        })
        .collect()
}
