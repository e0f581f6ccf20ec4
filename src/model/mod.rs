//! Layout data model shared by every pipeline stage.
//!
//! ```text
//! DocumentReference ── items ──▶ DocumentEntry ── layout ──▶ Area ── kind ──▶ AreaKind
//!   (one input)                    (one page)                 (one region)
//! ```
//!
//! Every optional field serialises as an explicit `null`, never as a missing
//! key: downstream consumers tell "not extracted yet" apart from "extracted
//! as empty" that way.

mod area;
mod document;
mod label;

pub use area::{Area, AreaKind, BoundingBox, TableCell, MAX_TABLE_EXTENT};
pub use document::{DocumentEntry, DocumentReference, PAGE_JOINER};
pub use label::Label;
