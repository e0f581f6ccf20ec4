//! Postprocessors: whole-batch passes over the extracted documents.
//!
//! A postprocessor sees every surviving document at once, after extraction
//! and page fan-in. It may rewrite layouts or drop documents, but it never
//! reorders them and never adds any.
//!
//! The filters here touch `layout` only. Page and document `converted` text
//! stays as extracted; renderers that walk the layout see the filtered view.

use crate::model::{Area, DocumentReference, Label};
use std::path::Path;
use tracing::debug;

/// Transforms the whole extracted batch.
///
/// Implementations must return at most as many documents as they received,
/// in the same relative order.
pub trait Postprocessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, documents: Vec<DocumentReference>, output_dir: &Path) -> Vec<DocumentReference>;
}

/// Apply `keep` to every area of every page, counting what was dropped.
fn retain_areas(documents: &mut [DocumentReference], keep: impl Fn(&Area) -> bool) -> usize {
    let mut dropped = 0;
    for page in documents.iter_mut().flat_map(|d| d.items.iter_mut()) {
        let before = page.layout.len();
        page.layout.retain(&keep);
        dropped += before - page.layout.len();
    }
    dropped
}

// ── Label filter ─────────────────────────────────────────────────────────────

/// Drops areas by label.
///
/// With `keep` set only those labels survive; `discard` then removes labels
/// from what is left. Both unset is a no-op.
#[derive(Debug, Clone, Default)]
pub struct LabelFilter {
    pub keep: Option<Vec<Label>>,
    pub discard: Option<Vec<Label>>,
}

impl LabelFilter {
    pub fn keep(labels: impl IntoIterator<Item = Label>) -> Self {
        Self {
            keep: Some(labels.into_iter().collect()),
            discard: None,
        }
    }

    pub fn discard(labels: impl IntoIterator<Item = Label>) -> Self {
        Self {
            keep: None,
            discard: Some(labels.into_iter().collect()),
        }
    }

    fn admits(&self, label: Label) -> bool {
        let kept = self.keep.as_ref().map_or(true, |k| k.contains(&label));
        let discarded = self.discard.as_ref().is_some_and(|d| d.contains(&label));
        kept && !discarded
    }
}

impl Postprocessor for LabelFilter {
    fn name(&self) -> &str {
        "label-filter"
    }

    fn process(&self, mut documents: Vec<DocumentReference>, _output_dir: &Path) -> Vec<DocumentReference> {
        let dropped = retain_areas(&mut documents, |a| self.admits(a.label));
        debug!("label filter dropped {dropped} areas");
        documents
    }
}

// ── Confidence filter ────────────────────────────────────────────────────────

/// Drops areas whose detector confidence is below `min`.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceFilter {
    pub min: f64,
}

impl ConfidenceFilter {
    pub fn new(min: f64) -> Self {
        Self {
            min: min.clamp(0.0, 1.0),
        }
    }
}

impl Postprocessor for ConfidenceFilter {
    fn name(&self) -> &str {
        "confidence-filter"
    }

    fn process(&self, mut documents: Vec<DocumentReference>, _output_dir: &Path) -> Vec<DocumentReference> {
        let dropped = retain_areas(&mut documents, |a| a.confidence >= self.min);
        debug!("confidence filter (< {}) dropped {dropped} areas", self.min);
        documents
    }
}
