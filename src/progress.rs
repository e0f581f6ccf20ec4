//! Progress-callback trait for per-page pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the executor moves pages through extraction. The CLI uses it to
//! drive a terminal progress bar; a service can forward events to a channel.
//!
//! # Example
//!
//! ```rust
//! use folioforge::{PipelineConfig, PipelineProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, document: &Path, page_num: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} p{}: {} chars", document.display(), page_num, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the executors as they process documents and pages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Under the parallel executor, the per-page methods are called concurrently
/// from different worker threads. Implementations must protect shared
/// mutable state with `Mutex`, atomics, or similar.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before preprocessing, with the number of input paths.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when pages are queued for extraction, with the number queued.
    ///
    /// The parallel executor queues the whole batch at once; the sequential
    /// executor queues one document at a time, so totals grow as it goes.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before the first extraction attempt of a page.
    ///
    /// `page_num` is 1-indexed within its document.
    fn on_page_start(&self, document: &Path, page_num: usize) {
        let _ = (document, page_num);
    }

    /// Called when a page was extracted; `text_len` is the byte length of
    /// its full-page text.
    fn on_page_complete(&self, document: &Path, page_num: usize, text_len: usize) {
        let _ = (document, page_num, text_len);
    }

    /// Called when a page gave up after all retries, or hit an artifact
    /// failure that drops its document.
    fn on_page_error(&self, document: &Path, page_num: usize, error: &str) {
        let _ = (document, page_num, error);
    }

    /// Called once after postprocessing.
    ///
    /// * `documents`      — documents in the final output
    /// * `degraded_pages` — pages left with `converted = None`
    fn on_batch_complete(&self, documents: usize, degraded_pages: usize) {
        let _ = (documents, degraded_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
