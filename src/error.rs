//! Error types for the folioforge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FolioError`] — **Fatal**: the batch cannot proceed at all (invalid
//!   configuration, a non-distributable extractor paired with the parallel
//!   executor, runtime construction failure). Returned as `Err(FolioError)`
//!   from executor setup, `execute` and the top-level `convert*` functions.
//!
//! * [`StageError`] — **Non-fatal**: one stage failed for one document or one
//!   page. Transient failures are retried by the executor; exhausted pages
//!   degrade to `converted = None`; artifact I/O failures drop the affected
//!   document only.
//!
//! A preprocessor declining a document is neither: it returns `Ok(None)`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the folioforge library.
#[derive(Debug, Error)]
pub enum FolioError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The parallel executor moves the extractor across worker threads; this
    /// one declared that it cannot be moved.
    #[error(
        "Extractor '{extractor}' is not distributable and cannot run under the parallel executor.\n\
         Use the sequential executor instead."
    )]
    NotDistributable { extractor: String },

    /// The configured vision provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Runtime errors ────────────────────────────────────────────────────
    /// The tokio runtime backing an executor could not be built.
    #[error("Failed to start executor runtime: {0}")]
    Runtime(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a rendered output file.
    #[error("Failed to write output file '{}': {source}", path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structured output could not be serialised.
    #[error("Serialisation failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a stage task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error raised by a single stage for one document or page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The backend failed (network error, model error). Retryable.
    #[error("extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    /// The backend answered but its output did not validate. Retryable.
    #[error("malformed response: {detail}")]
    MalformedResponse { detail: String },

    /// Reading or writing an artifact failed. Drops the affected document.
    #[error("artifact I/O failed for '{}': {detail}", path.display())]
    ArtifactIo { path: PathBuf, detail: String },

    /// A single extraction exceeded the configured timeout. Retryable.
    #[error("extraction timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl StageError {
    pub fn failed(detail: impl Into<String>) -> Self {
        StageError::ExtractionFailed {
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        StageError::MalformedResponse {
            detail: detail.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, source: impl std::fmt::Display) -> Self {
        StageError::ArtifactIo {
            path: path.into(),
            detail: source.to_string(),
        }
    }

    /// Whether the executor should try the same page again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StageError::ArtifactIo { .. })
    }
}
