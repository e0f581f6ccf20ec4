//! Top-level entry points: build an executor, run it, render the result.
//!
//! These are synchronous: executors own their tokio runtime. Call them from
//! plain threads (or `spawn_blocking`), never from inside an async task.

use crate::config::PipelineConfig;
use crate::error::FolioError;
use crate::executor::{build_executor, ExecutorKind, Stages};
use crate::model::DocumentReference;
use crate::output::{OutputFormat, OutputGenerator};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Run `paths` through `stages` and render the surviving documents.
///
/// Returns `(reference, rendered)` pairs in input order. Filtered and
/// dropped documents are absent; degraded pages are present with no text.
///
/// # Errors
/// Only fatal errors: invalid stage/executor pairing, runtime construction
/// failure, or a generator that cannot serialise.
pub fn convert<G: OutputGenerator>(
    paths: &[PathBuf],
    stages: Stages,
    config: PipelineConfig,
    kind: ExecutorKind,
    generator: &G,
) -> Result<Vec<(DocumentReference, G::Output)>, FolioError> {
    let start = Instant::now();
    let executor = build_executor(kind, stages, config)?;
    let documents = executor.execute(paths)?;
    let rendered = generator.convert(documents)?;
    info!(
        "Converted {}/{} documents with the {} executor in {:?}",
        rendered.len(),
        paths.len(),
        executor.name(),
        start.elapsed()
    );
    Ok(rendered)
}

/// Convert and write one file per document to
/// `output_dir/<name>/<name>.<ext>`, next to that document's artifacts.
/// `<name>` is the stem, suffixed with the input position when two inputs
/// share a stem.
///
/// Each file is written atomically (temp file + rename). Returns the written
/// paths in input order.
pub fn convert_to_dir(
    paths: &[PathBuf],
    stages: Stages,
    config: PipelineConfig,
    kind: ExecutorKind,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, FolioError> {
    let output_dir = config.output_dir.clone();
    let executor = build_executor(kind, stages, config)?;
    let documents = executor.execute(paths)?;

    format
        .render(documents)?
        .into_iter()
        .map(|(doc, text)| {
            let name = doc.artifact_name();
            let path = doc
                .artifact_dir(&output_dir)
                .join(format!("{name}.{}", format.extension()));
            write_atomic(&path, &text)?;
            debug!("{} → {}", doc.path.display(), path.display());
            Ok(path)
        })
        .collect()
}

/// Write `contents` to `path` via a sibling temp file and a rename, so
/// readers never see a partial file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), FolioError> {
    let fail = |source| FolioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).map_err(fail)?;
    fs::rename(&tmp, path).map_err(fail)
}
