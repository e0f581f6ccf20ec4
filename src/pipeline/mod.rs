//! Pipeline stages and the contracts the executors drive them through.
//!
//! Each stage is a trait object so the CLI (or a library caller) can pick
//! implementations by name at runtime. The executors in [`crate::executor`]
//! own ordering, retries and failure policy; stages only transform.
//!
//! ## Data Flow
//!
//! ```text
//! paths ──▶ Preprocessor* ──▶ Extractor (per page) ──▶ Postprocessor* ──▶ output
//!           (intake, filter)  (layout + text)          (filter, debug)
//! ```
//!
//! 1. [`preprocess`]  — turn an empty reference into pages, or decline it
//! 2. [`extract`]     — the extractor contract and composition
//! 3. [`sidecar`]     — layout read from JSON files written by an external detector
//! 4. [`vision`]      — layout and text from a vision LLM; the only stage with
//!    network I/O
//! 5. [`encode`]      — PNG-encode and base64-wrap a page for the vision request
//! 6. [`cleanup`]     — deterministic text rules for backend quirks
//! 7. [`postprocess`] — whole-batch filters
//! 8. [`debug`]       — layout overlays written next to the artifacts

pub mod cleanup;
pub mod debug;
pub mod encode;
pub mod extract;
pub mod postprocess;
pub mod preprocess;
pub mod sidecar;
pub mod vision;

pub use extract::{Extractor, TwoPhaseExtractor};
pub use postprocess::Postprocessor;
pub use preprocess::Preprocessor;

use crate::model::Area;

/// Full-page text from a freshly extracted layout: non-empty area texts in
/// detection order, one per line.
pub fn page_text(layout: &[Area]) -> String {
    layout
        .iter()
        .map(Area::text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
