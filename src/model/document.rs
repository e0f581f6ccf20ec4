//! Documents and their pages.

use super::Area;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Separator placed between page texts in [`DocumentReference::converted`].
pub const PAGE_JOINER: &str = "\n\n";

/// One page of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Rendered page artifact (usually a PNG under the output directory).
    pub path: PathBuf,
    /// Areas in detection order, not spatial order.
    pub layout: Vec<Area>,
    /// Full-page text; `None` until extracted, or after extraction gave up.
    pub converted: Option<String>,
}

impl DocumentEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            layout: Vec::new(),
            converted: None,
        }
    }

    /// File stem of the page artifact, e.g. `page3`.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// One input document and its ordered pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub path: PathBuf,
    /// Page order is significant and must survive every pipeline stage.
    pub items: Vec<DocumentEntry>,
    pub converted: Option<String>,
    /// Artifact directory name when the stem alone would collide with
    /// another document in the same batch.
    #[serde(skip)]
    pub artifact_key: Option<String>,
}

impl DocumentReference {
    /// An empty reference as created at intake.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            items: Vec::new(),
            converted: None,
            artifact_key: None,
        }
    }

    /// Set the artifact directory name.
    pub fn with_artifact_key(mut self, key: impl Into<String>) -> Self {
        self.artifact_key = Some(key.into());
        self
    }

    /// Document name used to scope artifacts under the output directory.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Name of the artifact directory: the artifact key if set, else the stem.
    pub fn artifact_name(&self) -> String {
        self.artifact_key.clone().unwrap_or_else(|| self.stem())
    }

    /// Directory holding this document's artifacts: `output_dir/<artifact_name>`.
    pub fn artifact_dir(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.artifact_name())
    }

    /// Recompute `converted` from the page texts, in page order.
    ///
    /// Pages without text contribute an empty string so that page positions
    /// stay recognisable in the joined output.
    pub fn join_pages(&mut self) {
        let joined = self
            .items
            .iter()
            .map(|p| p.converted.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(PAGE_JOINER);
        self.converted = Some(joined);
    }

    pub fn page_count(&self) -> usize {
        self.items.len()
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
