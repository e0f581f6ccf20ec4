//! The extractor contract: one page in, the same page with layout and text out.
//!
//! Extractors are async because the interesting backends (hosted vision
//! models, inference servers) are network-bound. Local backends do their
//! blocking work inside `spawn_blocking` or through `tokio::fs`.
//!
//! Retries and timeouts are not the extractor's concern: it makes one
//! attempt and reports what went wrong through [`StageError`]; the executor
//! decides whether to try again.

use crate::error::StageError;
use crate::model::DocumentEntry;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Populates `layout` and `converted` for one page.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name used in logs and configuration errors.
    fn name(&self) -> &str;

    /// Whether the extractor may be shared across the parallel executor's
    /// worker threads.
    ///
    /// Backends bound to one thread or process (a loaded model handle, a GPU
    /// context) return `false`; pairing them with the parallel executor is
    /// rejected at setup time, before any document is touched.
    fn distributable(&self) -> bool {
        true
    }

    /// Run extraction once for `entry`.
    async fn extract(&self, entry: DocumentEntry) -> Result<DocumentEntry, StageError>;
}

/// Runs a layout phase, then a text phase, on the same page.
///
/// The first phase usually fills `layout` with empty areas and the second
/// fills in their `converted` text.
pub struct TwoPhaseExtractor {
    layout: Arc<dyn Extractor>,
    text: Arc<dyn Extractor>,
    name: String,
}

impl TwoPhaseExtractor {
    pub fn new(layout: Arc<dyn Extractor>, text: Arc<dyn Extractor>) -> Self {
        let name = format!("{}+{}", layout.name(), text.name());
        Self { layout, text, name }
    }
}

#[async_trait]
impl Extractor for TwoPhaseExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn distributable(&self) -> bool {
        self.layout.distributable() && self.text.distributable()
    }

    async fn extract(&self, entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
        let entry = self.layout.extract(entry).await?;
        debug!(
            "{}: layout phase found {} areas",
            entry.path.display(),
            entry.layout.len()
        );
        self.text.extract(entry).await
    }
}
