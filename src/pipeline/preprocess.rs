//! Preprocessors: turn an intake reference into pages, or decline it.
//!
//! A preprocessor returning `Ok(None)` filters the document out. That is not
//! an error; the executor skips the remaining preprocessors for that document
//! and leaves every other document untouched. `Err(StageError::ArtifactIo)`
//! drops the document too, but is logged as a failure.

use crate::error::StageError;
use crate::model::{DocumentEntry, DocumentReference};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Transforms one document before extraction.
///
/// Preprocessors run on blocking threads, so synchronous file I/O is fine.
pub trait Preprocessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(
        &self,
        document: DocumentReference,
        output_dir: &Path,
    ) -> Result<Option<DocumentReference>, StageError>;
}

/// Page image extensions accepted at intake.
pub const PAGE_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Intake for already-rasterised documents.
///
/// * a directory of page images becomes one document, pages in natural
///   file-name order (`page2` before `page10`)
/// * a single image file becomes a one-page document
///
/// Pages are copied to `<artifact dir>/page{n}.{ext}` so that every later
/// artifact writer (crops, overlays) stays inside the document's own subpath.
/// A `.json` layout file next to a source page travels with it.
#[derive(Debug, Clone)]
pub struct PageImagePreprocessor {
    /// Decline inputs that are neither an image nor a directory of images.
    /// When `false` they pass through unchanged (with no pages).
    pub filter_unsupported: bool,
}

impl Default for PageImagePreprocessor {
    fn default() -> Self {
        Self {
            filter_unsupported: true,
        }
    }
}

impl Preprocessor for PageImagePreprocessor {
    fn name(&self) -> &str {
        "page-images"
    }

    fn process(
        &self,
        mut document: DocumentReference,
        output_dir: &Path,
    ) -> Result<Option<DocumentReference>, StageError> {
        if !document.items.is_empty() {
            return Ok(Some(document));
        }

        let sources = page_sources(&document.path)?;
        if sources.is_empty() {
            if self.filter_unsupported {
                debug!("{}: no page images, filtered out", document.path.display());
                return Ok(None);
            }
            return Ok(Some(document));
        }

        let dir = document.artifact_dir(output_dir);
        fs::create_dir_all(&dir).map_err(|e| StageError::artifact(&dir, e))?;

        for (n, src) in sources.iter().enumerate() {
            let ext = extension(src).unwrap_or_else(|| "png".to_string());
            let dest = dir.join(format!("page{n}.{ext}"));
            fs::copy(src, &dest).map_err(|e| StageError::artifact(src, e))?;
            let layout = src.with_extension("json");
            if layout.is_file() {
                let layout_dest = dest.with_extension("json");
                fs::copy(&layout, &layout_dest).map_err(|e| StageError::artifact(&layout, e))?;
            }
            document.items.push(DocumentEntry::new(dest));
        }

        debug!(
            "{}: {} pages staged in {}",
            document.path.display(),
            document.items.len(),
            dir.display()
        );
        Ok(Some(document))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn is_page_image(path: &Path) -> bool {
    path.is_file()
        && extension(path)
            .map(|e| PAGE_IMAGE_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false)
}

fn page_sources(path: &Path) -> Result<Vec<PathBuf>, StageError> {
    if path.is_dir() {
        let entries = fs::read_dir(path).map_err(|e| StageError::artifact(path, e))?;
        let mut pages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StageError::artifact(path, e))?;
            let p = entry.path();
            if is_page_image(&p) {
                pages.push(p);
            }
        }
        pages.sort_by_key(|p| natural_key(&p.file_name().unwrap_or_default().to_string_lossy()));
        Ok(pages)
    } else if is_page_image(path) {
        Ok(vec![path.to_path_buf()])
    } else {
        Ok(Vec::new())
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Number(u64),
    Text(String),
}

static RE_CHUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+|\D+").unwrap());

/// Sort key that compares digit runs numerically.
fn natural_key(name: &str) -> Vec<NaturalChunk> {
    RE_CHUNK
        .find_iter(name)
        .map(|m| {
            let s = m.as_str();
            match s.parse::<u64>() {
                Ok(n) => NaturalChunk::Number(n),
                Err(_) => NaturalChunk::Text(s.to_lowercase()),
            }
        })
        .collect()
}
