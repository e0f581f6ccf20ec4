//! Parallel executor: bounded fan-out per phase, explicit-ordinal fan-in.
//!
//! ```text
//! paths ─▶ [spawn_blocking × workers] preprocess ─▶ sort by doc ordinal
//!       ─▶ flatten to (doc ordinal, page ordinal, entry)
//!       ─▶ [tokio::spawn × workers] extract + retry
//!       ─▶ group by doc ordinal, sort by page ordinal, join ─▶ postprocess
//! ```
//!
//! Completion order is arbitrary in both fan-out phases. Every result carries
//! the ordinals it was dispatched with, and fan-in sorts by them; nothing
//! depends on arrival order.

use super::{extract_with_retry, finish, intake, run_preprocessors, PageOutcome, PipelineExecutor, Stages};
use crate::config::PipelineConfig;
use crate::error::FolioError;
use crate::model::{DocumentEntry, DocumentReference};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// One page of work, tagged with where its result belongs.
struct PageTask {
    doc: usize,
    page: usize,
    document: PathBuf,
    entry: DocumentEntry,
}

/// Multi-threaded executor with `workers` threads and `workers` in-flight
/// tasks per phase.
///
/// Construction fails with [`FolioError::NotDistributable`] when the
/// extractor cannot be shared across threads.
pub struct ParallelExecutor {
    stages: Stages,
    config: Arc<PipelineConfig>,
    runtime: Runtime,
}

impl ParallelExecutor {
    pub fn new(stages: Stages, config: PipelineConfig) -> Result<Self, FolioError> {
        if !stages.extractor.distributable() {
            return Err(FolioError::NotDistributable {
                extractor: stages.extractor.name().to_string(),
            });
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.workers.max(1))
            .thread_name("folioforge-worker")
            .enable_all()
            .build()
            .map_err(|e| FolioError::Runtime(e.to_string()))?;
        Ok(Self {
            stages: stages.with_config(&config),
            config: Arc::new(config),
            runtime,
        })
    }

    async fn preprocess_all(
        &self,
        paths: &[PathBuf],
    ) -> Result<Vec<(usize, DocumentReference)>, JoinError> {
        let results: Vec<Result<Option<(usize, DocumentReference)>, JoinError>> =
            stream::iter(intake(paths).into_iter().enumerate().map(|(ordinal, document)| {
                let preprocessors = self.stages.preprocessors.clone();
                let output_dir = self.config.output_dir.clone();
                async move {
                    let doc = tokio::task::spawn_blocking(move || {
                        run_preprocessors(&preprocessors, document, &output_dir)
                    })
                    .await?;
                    Ok::<_, JoinError>(doc.map(|d| (ordinal, d)))
                }
            }))
            .buffer_unordered(self.config.workers)
            .collect()
            .await;

        let mut prepared = results
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        prepared.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(prepared)
    }

    async fn extract_all(
        &self,
        tasks: Vec<PageTask>,
    ) -> Result<Vec<(usize, usize, PageOutcome)>, JoinError> {
        let results: Vec<Result<(usize, usize, PageOutcome), JoinError>> =
            stream::iter(tasks.into_iter().map(|task| {
                let extractor = Arc::clone(&self.stages.extractor);
                let config = Arc::clone(&self.config);
                tokio::spawn(async move {
                    let outcome = extract_with_retry(
                        extractor.as_ref(),
                        task.entry,
                        &config,
                        &task.document,
                        task.page + 1,
                    )
                    .await;
                    (task.doc, task.page, outcome)
                })
            }))
            .buffer_unordered(self.config.workers)
            .collect()
            .await;
        results.into_iter().collect()
    }

    async fn run(&self, paths: &[PathBuf]) -> Result<Vec<DocumentReference>, FolioError> {
        let prepared = self
            .preprocess_all(paths)
            .await
            .map_err(|e| FolioError::Internal(format!("preprocessing task failed: {e}")))?;

        // Flatten. Shells keep document metadata while their pages are out.
        let mut shells = Vec::with_capacity(prepared.len());
        let mut tasks = Vec::new();
        for (doc, mut reference) in prepared {
            for (page, entry) in std::mem::take(&mut reference.items).into_iter().enumerate() {
                tasks.push(PageTask {
                    doc,
                    page,
                    document: reference.path.clone(),
                    entry,
                });
            }
            shells.push((doc, reference));
        }
        debug!("{} documents flattened into {} pages", shells.len(), tasks.len());
        if let Some(cb) = &self.config.progress_callback {
            cb.on_extraction_start(tasks.len());
        }

        let results = self
            .extract_all(tasks)
            .await
            .map_err(|e| FolioError::Internal(format!("extraction task failed: {e}")))?;

        // Fan-in by explicit ordinals.
        let mut pages: BTreeMap<usize, Vec<(usize, DocumentEntry)>> = BTreeMap::new();
        let mut dropped: BTreeSet<usize> = BTreeSet::new();
        for (doc, page, outcome) in results {
            match outcome {
                PageOutcome::Extracted(entry) | PageOutcome::Degraded(entry) => {
                    pages.entry(doc).or_default().push((page, entry));
                }
                PageOutcome::DropDocument(e) => {
                    debug!("document #{doc} page #{page}: {e}");
                    dropped.insert(doc);
                }
            }
        }

        let mut documents = Vec::with_capacity(shells.len());
        for (doc, mut reference) in shells {
            if dropped.contains(&doc) {
                warn!("{}: dropped after an artifact failure", reference.path.display());
                continue;
            }
            let mut doc_pages = pages.remove(&doc).unwrap_or_default();
            doc_pages.sort_by_key(|(page, _)| *page);
            reference.items = doc_pages.into_iter().map(|(_, entry)| entry).collect();
            reference.join_pages();
            documents.push(reference);
        }
        Ok(documents)
    }
}

impl PipelineExecutor for ParallelExecutor {
    fn name(&self) -> &str {
        "parallel"
    }

    fn execute(&self, paths: &[PathBuf]) -> Result<Vec<DocumentReference>, FolioError> {
        info!(
            "Parallel run: {} documents, {} workers, extractor '{}'",
            paths.len(),
            self.config.workers,
            self.stages.extractor.name()
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_batch_start(paths.len());
        }
        let documents = self.runtime.block_on(self.run(paths))?;
        Ok(finish(documents, &self.stages, &self.config))
    }
}
