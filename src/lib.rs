//! # folioforge
//!
//! Turn scanned or rasterised documents into structured output: Markdown,
//! HTML, or a JSON layout tree.
//!
//! ## Why this crate?
//!
//! Layout detectors and vision models each speak their own label vocabulary
//! and fail in their own ways. folioforge puts them behind one small set of
//! stage contracts, canonicalises every label onto one set, and drives the
//! stages with executors that keep document and page order intact no matter
//! how work completes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paths
//!  │
//!  ├─ 1. Preprocess   intake pages, filter unsupported inputs
//!  ├─ 2. Extract      per page: layout + text (sidecar JSON, vision LLM, …)
//!  ├─ 3. Fan-in       regroup pages by (document, page) ordinal, join text
//!  ├─ 4. Postprocess  label / confidence filters, debug overlays
//!  └─ 5. Output       Markdown, HTML, JSON or raw text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folioforge::executor::{ExecutorKind, Stages};
//! use folioforge::output::MarkdownGenerator;
//! use folioforge::pipeline::preprocess::PageImagePreprocessor;
//! use folioforge::pipeline::sidecar::SidecarExtractor;
//! use folioforge::{convert, PipelineConfig, Vocabulary};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stages = Stages::new(Arc::new(SidecarExtractor::new(Vocabulary::DocLayNet)))
//!         .preprocessor(PageImagePreprocessor::default());
//!     let config = PipelineConfig::builder().workers(8).build()?;
//!
//!     let paths = vec![PathBuf::from("scans/report")];
//!     for (doc, markdown) in convert(&paths, stages, config, ExecutorKind::Parallel, &MarkdownGenerator)? {
//!         println!("## {}\n{}", doc.path.display(), markdown);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `folioforge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! folioforge = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod canonical;
pub mod config;
pub mod convert;
pub mod error;
pub mod executor;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use canonical::Vocabulary;
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use convert::{convert, convert_to_dir};
pub use error::{FolioError, StageError};
pub use executor::{ExecutorKind, PipelineExecutor, Stages};
pub use model::{Area, AreaKind, BoundingBox, DocumentEntry, DocumentReference, Label, TableCell};
pub use output::{OutputFormat, OutputGenerator};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
