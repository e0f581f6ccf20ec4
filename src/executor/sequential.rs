//! One document at a time, one page at a time, on the calling thread.

use super::{extract_with_retry, finish, intake, run_preprocessors, PageOutcome, PipelineExecutor, Stages};
use crate::config::PipelineConfig;
use crate::error::FolioError;
use crate::model::DocumentReference;
use std::path::PathBuf;
use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};

/// Deterministic executor: each document is preprocessed, extracted and
/// joined before the next one starts.
///
/// Accepts any extractor, distributable or not.
pub struct SequentialExecutor {
    stages: Stages,
    config: PipelineConfig,
    runtime: Runtime,
}

impl SequentialExecutor {
    pub fn new(stages: Stages, config: PipelineConfig) -> Result<Self, FolioError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FolioError::Runtime(e.to_string()))?;
        Ok(Self {
            stages: stages.with_config(&config),
            config,
            runtime,
        })
    }

    /// Extract every page of `doc` in order; `None` if the document is dropped.
    async fn extract_document(&self, mut doc: DocumentReference) -> Option<DocumentReference> {
        let pages = std::mem::take(&mut doc.items);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_extraction_start(pages.len());
        }

        for (i, page) in pages.into_iter().enumerate() {
            let outcome = extract_with_retry(
                self.stages.extractor.as_ref(),
                page,
                &self.config,
                &doc.path,
                i + 1,
            )
            .await;
            match outcome {
                PageOutcome::Extracted(entry) | PageOutcome::Degraded(entry) => doc.items.push(entry),
                PageOutcome::DropDocument(e) => {
                    warn!("{}: dropped, page {} failed: {e}", doc.path.display(), i + 1);
                    return None;
                }
            }
        }
        doc.join_pages();
        Some(doc)
    }

    async fn run(&self, paths: &[PathBuf]) -> Vec<DocumentReference> {
        let mut done = Vec::with_capacity(paths.len());
        for document in intake(paths) {
            let Some(doc) = run_preprocessors(
                &self.stages.preprocessors,
                document,
                &self.config.output_dir,
            ) else {
                continue;
            };
            if let Some(doc) = self.extract_document(doc).await {
                done.push(doc);
            }
        }
        done
    }
}

impl PipelineExecutor for SequentialExecutor {
    fn name(&self) -> &str {
        "sequential"
    }

    fn execute(&self, paths: &[PathBuf]) -> Result<Vec<DocumentReference>, FolioError> {
        info!(
            "Sequential run: {} documents, extractor '{}'",
            paths.len(),
            self.stages.extractor.name()
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_batch_start(paths.len());
        }
        let documents = self.runtime.block_on(self.run(paths));
        Ok(finish(documents, &self.stages, &self.config))
    }
}
