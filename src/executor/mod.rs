//! Pipeline executors: drive stages over a batch of documents.
//!
//! Both executors share one contract: `execute(paths)` returns the surviving
//! documents aligned to input order, with each document's pages in page
//! order. They differ only in how much runs at once.
//!
//! | Executor | Runtime | Preprocessing | Extraction |
//! |---|---|---|---|
//! | [`SequentialExecutor`] | current-thread | one document at a time | one page at a time |
//! | [`ParallelExecutor`] | `workers` threads | `spawn_blocking`, `workers` in flight | spawned tasks, `workers` in flight |
//!
//! ## Failure policy
//!
//! * a preprocessor returning `None` or an error drops that document
//! * a retryable extraction failure is retried with exponential backoff;
//!   once retries run out the page is kept with `converted = None`
//! * an artifact failure during extraction drops the document
//! * configuration mismatches are `Err(FolioError)` before any work
//!
//! `execute` blocks on the executor's own runtime and must not be called
//! from inside another tokio runtime.

mod parallel;
mod sequential;

pub use parallel::ParallelExecutor;
pub use sequential::SequentialExecutor;

use crate::config::PipelineConfig;
use crate::error::{FolioError, StageError};
use crate::model::{DocumentEntry, DocumentReference};
use crate::pipeline::debug::DebugPostprocessor;
use crate::pipeline::postprocess::ConfidenceFilter;
use crate::pipeline::{Extractor, Postprocessor, Preprocessor};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// The stage implementations a run is built from.
#[derive(Clone)]
pub struct Stages {
    pub preprocessors: Vec<Arc<dyn Preprocessor>>,
    pub extractor: Arc<dyn Extractor>,
    pub postprocessors: Vec<Arc<dyn Postprocessor>>,
}

impl Stages {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self {
            preprocessors: Vec::new(),
            extractor,
            postprocessors: Vec::new(),
        }
    }

    /// Append a preprocessor; they run in the order added.
    pub fn preprocessor(mut self, p: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(Arc::new(p));
        self
    }

    /// Append a postprocessor; they run in the order added.
    pub fn postprocessor(mut self, p: impl Postprocessor + 'static) -> Self {
        self.postprocessors.push(Arc::new(p));
        self
    }

    /// Append the postprocessors the config asks for, after any added by
    /// hand: a [`ConfidenceFilter`] when `confidence_threshold > 0`, then a
    /// [`DebugPostprocessor`] when `debug` is set. Both executors apply this
    /// on construction.
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        if config.confidence_threshold > 0.0 {
            self = self.postprocessor(ConfidenceFilter::new(config.confidence_threshold));
        }
        if config.debug {
            self = self.postprocessor(DebugPostprocessor::default());
        }
        self
    }
}

impl fmt::Debug for Stages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stages")
            .field(
                "preprocessors",
                &self.preprocessors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("extractor", &self.extractor.name())
            .field(
                "postprocessors",
                &self.postprocessors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Runs a batch through the configured stages.
pub trait PipelineExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// Process `paths` and return the surviving documents in input order.
    fn execute(&self, paths: &[PathBuf]) -> Result<Vec<DocumentReference>, FolioError>;
}

/// Executor selection for [`build_executor`] and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    #[default]
    Sequential,
    Parallel,
}

impl ExecutorKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sequential" | "simple" => Some(ExecutorKind::Sequential),
            "parallel" => Some(ExecutorKind::Parallel),
            _ => None,
        }
    }
}

/// Build an executor, validating the stages against it.
pub fn build_executor(
    kind: ExecutorKind,
    stages: Stages,
    config: PipelineConfig,
) -> Result<Box<dyn PipelineExecutor>, FolioError> {
    Ok(match kind {
        ExecutorKind::Sequential => Box::new(SequentialExecutor::new(stages, config)?),
        ExecutorKind::Parallel => Box::new(ParallelExecutor::new(stages, config)?),
    })
}

// ── Shared stage drivers ─────────────────────────────────────────────────────

/// Create one reference per input path, in input order.
///
/// Documents whose stems collide get an artifact key of `<stem>-<ordinal>`
/// (1-based input position), so no two documents share an artifact
/// directory. Unique stems keep the plain stem.
pub(crate) fn intake(paths: &[PathBuf]) -> Vec<DocumentReference> {
    let docs: Vec<DocumentReference> = paths.iter().map(DocumentReference::new).collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for doc in &docs {
        *counts.entry(doc.stem()).or_insert(0) += 1;
    }
    let mut taken: HashSet<String> = counts.keys().cloned().collect();

    docs.into_iter()
        .enumerate()
        .map(|(i, doc)| {
            let stem = doc.stem();
            if counts[&stem] < 2 {
                return doc;
            }
            let mut key = format!("{stem}-{}", i + 1);
            while !taken.insert(key.clone()) {
                key.push('_');
            }
            debug!("{}: artifacts under '{key}'", doc.path.display());
            doc.with_artifact_key(key)
        })
        .collect()
}

/// Run the preprocessors in order. The first `None` or error ends the chain
/// and drops the document.
pub(crate) fn run_preprocessors(
    preprocessors: &[Arc<dyn Preprocessor>],
    document: DocumentReference,
    output_dir: &Path,
) -> Option<DocumentReference> {
    let mut doc = document;
    for p in preprocessors {
        let path = doc.path.clone();
        match p.process(doc, output_dir) {
            Ok(Some(next)) => doc = next,
            Ok(None) => {
                warn!("{}: filtered out by {}", path.display(), p.name());
                return None;
            }
            Err(e) => {
                warn!("{}: dropped, {} failed: {e}", path.display(), p.name());
                return None;
            }
        }
    }
    debug!("{}: {} pages after preprocessing", doc.path.display(), doc.page_count());
    Some(doc)
}

/// What became of one page after extraction.
#[derive(Debug)]
pub(crate) enum PageOutcome {
    Extracted(DocumentEntry),
    /// Retries exhausted; the page is kept with `converted = None`.
    Degraded(DocumentEntry),
    /// Non-retryable failure; the whole document goes.
    DropDocument(StageError),
}

async fn attempt(
    extractor: &dyn Extractor,
    entry: DocumentEntry,
    timeout_secs: Option<u64>,
) -> Result<DocumentEntry, StageError> {
    match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), extractor.extract(entry))
            .await
            .unwrap_or_else(|_| Err(StageError::Timeout { secs })),
        None => extractor.extract(entry).await,
    }
}

/// Extract one page, retrying retryable failures with exponential backoff.
///
/// `page_num` is 1-based and only used for logs and progress events.
pub(crate) async fn extract_with_retry(
    extractor: &dyn Extractor,
    entry: DocumentEntry,
    config: &PipelineConfig,
    document: &Path,
    page_num: usize,
) -> PageOutcome {
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_page_start(document, page_num);
    }

    let mut last_err: Option<StageError> = None;
    for n in 0..=config.max_retries {
        if n > 0 {
            let backoff = config.backoff_ms(n);
            warn!(
                "{} p{}: retry {}/{} after {}ms",
                document.display(),
                page_num,
                n,
                config.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match attempt(extractor, entry.clone(), config.extract_timeout_secs).await {
            Ok(done) => {
                if let Some(cb) = cb {
                    let len = done.converted.as_deref().map_or(0, str::len);
                    cb.on_page_complete(document, page_num, len);
                }
                return PageOutcome::Extracted(done);
            }
            Err(e) if !e.is_retryable() => {
                if let Some(cb) = cb {
                    cb.on_page_error(document, page_num, &e.to_string());
                }
                return PageOutcome::DropDocument(e);
            }
            Err(e) => {
                warn!(
                    "{} p{}: attempt {} failed: {e}",
                    document.display(),
                    page_num,
                    n + 1
                );
                last_err = Some(e);
            }
        }
    }

    let detail = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());
    warn!(
        "{} p{}: giving up after {} attempts: {detail}",
        document.display(),
        page_num,
        config.max_retries + 1
    );
    if let Some(cb) = cb {
        cb.on_page_error(document, page_num, &detail);
    }
    let mut degraded = entry;
    degraded.converted = None;
    PageOutcome::Degraded(degraded)
}

/// Run postprocessors over the extracted batch and report completion.
pub(crate) fn finish(
    documents: Vec<DocumentReference>,
    stages: &Stages,
    config: &PipelineConfig,
) -> Vec<DocumentReference> {
    let mut documents = documents;
    for p in &stages.postprocessors {
        let before = documents.len();
        documents = p.process(documents, &config.output_dir);
        debug!("{}: {} → {} documents", p.name(), before, documents.len());
    }

    let degraded = documents
        .iter()
        .flat_map(|d| d.items.iter())
        .filter(|p| p.converted.is_none())
        .count();
    info!(
        "Batch done: {} documents, {} degraded pages",
        documents.len(),
        degraded
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_batch_complete(documents.len(), degraded);
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: StageError,
    }

    #[async_trait]
    impl Extractor for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn extract(&self, mut entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(self.error.clone());
            }
            entry.converted = Some("ok".into());
            Ok(entry)
        }
    }

    struct Slow;

    #[async_trait]
    impl Extractor for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn extract(&self, entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
            sleep(Duration::from_secs(5)).await;
            Ok(entry)
        }
    }

    fn flaky(failures: u32, error: StageError) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
            error,
        }
    }

    fn config(max_retries: u32) -> PipelineConfig {
        PipelineConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    fn run(ex: &dyn Extractor, cfg: &PipelineConfig) -> PageOutcome {
        tokio_test::block_on(extract_with_retry(
            ex,
            DocumentEntry::new("p.png"),
            cfg,
            Path::new("doc"),
            1,
        ))
    }

    #[test]
    fn transient_failures_are_retried() {
        let ex = flaky(2, StageError::failed("503"));
        let outcome = run(&ex, &config(3));
        assert!(matches!(outcome, PageOutcome::Extracted(ref e) if e.converted.as_deref() == Some("ok")));
        assert_eq!(ex.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausted_retries_degrade_the_page() {
        let ex = flaky(10, StageError::malformed("prose"));
        let outcome = run(&ex, &config(2));
        assert!(matches!(outcome, PageOutcome::Degraded(ref e) if e.converted.is_none()));
        assert_eq!(ex.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn artifact_failures_are_not_retried() {
        let ex = flaky(10, StageError::artifact("p.png", "gone"));
        let outcome = run(&ex, &config(3));
        assert!(matches!(outcome, PageOutcome::DropDocument(StageError::ArtifactIo { .. })));
        assert_eq!(ex.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_count_as_failures() {
        let cfg = PipelineConfig::builder()
            .max_retries(0)
            .retry_backoff_ms(1)
            .extract_timeout_secs(1)
            .build()
            .unwrap();
        let outcome =
            extract_with_retry(&Slow, DocumentEntry::new("p.png"), &cfg, Path::new("doc"), 1).await;
        assert!(matches!(outcome, PageOutcome::Degraded(_)));
    }

    #[test]
    fn colliding_stems_get_distinct_artifact_dirs() {
        let paths: Vec<PathBuf> = ["a/report.pdf", "solo.pdf", "b/report.png", "report-3"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let names: Vec<String> = intake(&paths).iter().map(|d| d.artifact_name()).collect();
        assert_eq!(names, vec!["report-1", "solo", "report-3_", "report-3"]);
    }

    #[test]
    fn config_adds_confidence_filter_and_overlays() {
        let stages = || Stages::new(Arc::new(Slow));
        let names = |s: Stages| -> Vec<String> {
            s.postprocessors.iter().map(|p| p.name().to_string()).collect()
        };

        assert!(names(stages().with_config(&config(0))).is_empty());

        let cfg = PipelineConfig::builder()
            .confidence_threshold(0.5)
            .debug(true)
            .build()
            .unwrap();
        assert_eq!(names(stages().with_config(&cfg)), vec!["confidence-filter", "debug"]);
    }

    #[test]
    fn executor_kind_names() {
        assert_eq!(ExecutorKind::from_name("Parallel"), Some(ExecutorKind::Parallel));
        assert_eq!(ExecutorKind::from_name("simple"), Some(ExecutorKind::Sequential));
        assert_eq!(ExecutorKind::from_name("dask"), None);
    }
}
