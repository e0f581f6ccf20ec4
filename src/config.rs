//! Configuration types for a folioforge pipeline run.
//!
//! All executor behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The stages themselves (which preprocessors,
//! which extractor, which postprocessors) are passed separately as
//! [`crate::executor::Stages`]; this struct only holds the knobs that govern
//! how those stages are driven.

use crate::error::FolioError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Configuration for a pipeline run.
///
/// # Example
/// ```rust
/// use folioforge::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .workers(8)
///     .max_retries(5)
///     .output_dir("/tmp/folioforge")
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 8);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Worker threads and in-flight tasks for the parallel executor. Default: 4.
    ///
    /// Bounds both fan-out queues (document preprocessing and page
    /// extraction). Ignored by the sequential executor.
    pub workers: usize,

    /// Extra attempts for a page whose extraction failed. Default: 3.
    ///
    /// Third-party backends are flaky under load; after the last attempt the
    /// page is kept with `converted = None` rather than failing the batch.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Per-extraction timeout in seconds. Default: none.
    ///
    /// A timed-out attempt counts as a retryable failure.
    pub extract_timeout_secs: Option<u64>,

    /// Root of all artifacts (page copies, crops, debug overlays). Default: `output`.
    ///
    /// Each document writes only below its own artifact dir, normally
    /// `output_dir/<document stem>/`.
    pub output_dir: PathBuf,

    /// Areas below this confidence are dropped by
    /// [`crate::pipeline::postprocess::ConfidenceFilter`], which executors
    /// add when this is above 0. Range 0–1. Default: 0.
    pub confidence_threshold: f64,

    /// Append a [`crate::pipeline::debug::DebugPostprocessor`]. Default: false.
    pub debug: bool,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            extract_timeout_secs: None,
            output_dir: PathBuf::from("output"),
            confidence_threshold: 0.0,
            debug: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("workers", &self.workers)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("extract_timeout_secs", &self.extract_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("debug", &self.debug)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.retry_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = Some(secs);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn confidence_threshold(mut self, t: f64) -> Self {
        self.config.confidence_threshold = t;
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, FolioError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(FolioError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if !(0.0..=1.0).contains(&c.confidence_threshold) {
            return Err(FolioError::InvalidConfig(format!(
                "Confidence threshold must be 0–1, got {}",
                c.confidence_threshold
            )));
        }
        if c.extract_timeout_secs == Some(0) {
            return Err(FolioError::InvalidConfig(
                "Extraction timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.workers, 4);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 500);
        assert!(c.extract_timeout_secs.is_none());
        assert!(!c.debug);
    }

    #[test]
    fn workers_are_clamped_to_one() {
        let c = PipelineConfig::builder().workers(0).build().unwrap();
        assert_eq!(c.workers, 1);
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let err = PipelineConfig::builder()
            .confidence_threshold(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, FolioError::InvalidConfig(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(PipelineConfig::builder()
            .extract_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn backoff_doubles() {
        let c = PipelineConfig::default();
        assert_eq!(c.backoff_ms(1), 500);
        assert_eq!(c.backoff_ms(2), 1000);
        assert_eq!(c.backoff_ms(3), 2000);
    }

    #[test]
    fn debug_hides_callback() {
        let s = format!("{:?}", PipelineConfig::default());
        assert!(s.contains("progress_callback: None"));
    }
}
