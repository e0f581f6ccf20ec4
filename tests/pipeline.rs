//! Integration tests for the executors and the end-to-end sidecar pipeline.
//!
//! No network and no real images: extractors are mocks, and the sidecar run
//! uses placeholder page files with JSON layouts next to them.

use async_trait::async_trait;
use folioforge::executor::build_executor;
use folioforge::output::{HtmlGenerator, JsonGenerator, MarkdownGenerator, OutputGenerator};
use folioforge::pipeline::postprocess::LabelFilter;
use folioforge::pipeline::preprocess::PageImagePreprocessor;
use folioforge::pipeline::sidecar::SidecarExtractor;
use folioforge::pipeline::{Extractor, Preprocessor};
use folioforge::{
    convert, convert_to_dir, DocumentEntry, DocumentReference, ExecutorKind, FolioError, Label,
    OutputFormat, PipelineConfig, PipelineProgressCallback, StageError, Stages, Vocabulary,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Mock stages ──────────────────────────────────────────────────────────────

/// Gives each document `pages` pages named `<doc>/page{n}.png`; declines any
/// path whose name starts with `skip`.
struct FakePages {
    pages: usize,
}

impl Preprocessor for FakePages {
    fn name(&self) -> &str {
        "fake-pages"
    }

    fn process(
        &self,
        mut document: DocumentReference,
        _output_dir: &Path,
    ) -> Result<Option<DocumentReference>, StageError> {
        if document.stem().starts_with("skip") {
            return Ok(None);
        }
        for n in 0..self.pages {
            let page = document.path.join(format!("page{n}.png"));
            document.items.push(DocumentEntry::new(page));
        }
        Ok(Some(document))
    }
}

/// Echoes the page path as its text. Early pages sleep longest, so under
/// the parallel executor they finish last.
struct EchoExtractor {
    pages: usize,
    distributable: bool,
}

#[async_trait]
impl Extractor for EchoExtractor {
    fn name(&self) -> &str {
        "echo"
    }

    fn distributable(&self) -> bool {
        self.distributable
    }

    async fn extract(&self, mut entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
        let n: usize = entry
            .stem()
            .trim_start_matches("page")
            .parse()
            .unwrap_or(0);
        let delay = (self.pages.saturating_sub(n) as u64) * 5;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        entry.converted = Some(entry.path.display().to_string());
        Ok(entry)
    }
}

/// Fails the first `failures` attempts of every page.
struct FlakyExtractor {
    failures: usize,
    attempts: Mutex<HashMap<PathBuf, usize>>,
}

#[async_trait]
impl Extractor for FlakyExtractor {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn extract(&self, mut entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
        let seen = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(entry.path.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if seen <= self.failures {
            return Err(StageError::failed(format!("attempt {seen} refused")));
        }
        entry.converted = Some("ok".into());
        Ok(entry)
    }
}

/// Raises an artifact failure for pages of documents named `broken*`.
struct BrokenArtifacts;

#[async_trait]
impl Extractor for BrokenArtifacts {
    fn name(&self) -> &str {
        "broken-artifacts"
    }

    async fn extract(&self, mut entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
        if entry.path.to_string_lossy().contains("broken") {
            return Err(StageError::artifact(&entry.path, "file vanished"));
        }
        entry.converted = Some("fine".into());
        Ok(entry)
    }
}

#[derive(Default)]
struct Counting {
    queued: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    batch_done: AtomicUsize,
}

impl PipelineProgressCallback for Counting {
    fn on_extraction_start(&self, total_pages: usize) {
        self.queued.fetch_add(total_pages, Ordering::SeqCst);
    }

    fn on_page_complete(&self, _document: &Path, _page_num: usize, _text_len: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_page_error(&self, _document: &Path, _page_num: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, documents: usize, _degraded_pages: usize) {
        self.batch_done.store(documents, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const BOTH: [ExecutorKind; 2] = [ExecutorKind::Sequential, ExecutorKind::Parallel];

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

fn echo_stages(pages: usize) -> Stages {
    Stages::new(Arc::new(EchoExtractor {
        pages,
        distributable: true,
    }))
    .preprocessor(FakePages { pages })
}

fn fast_config() -> PipelineConfig {
    PipelineConfig::builder()
        .workers(4)
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

/// Route library logs through the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn run(
    kind: ExecutorKind,
    stages: Stages,
    config: PipelineConfig,
    inputs: &[PathBuf],
) -> Result<Vec<DocumentReference>, FolioError> {
    init_tracing();
    build_executor(kind, stages, config)?.execute(inputs)
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[test]
fn documents_and_pages_keep_input_order() {
    let inputs = paths(&["c", "a", "b"]);
    for kind in BOTH {
        let docs = run(kind, echo_stages(4), fast_config(), &inputs).unwrap();

        let stems: Vec<String> = docs.iter().map(|d| d.stem()).collect();
        assert_eq!(stems, vec!["c", "a", "b"], "{kind:?}");
        for doc in &docs {
            let texts: Vec<String> = doc
                .items
                .iter()
                .map(|p| p.converted.clone().unwrap())
                .collect();
            let expected: Vec<String> = (0..4)
                .map(|n| doc.path.join(format!("page{n}.png")).display().to_string())
                .collect();
            assert_eq!(texts, expected, "{kind:?}");
            assert_eq!(doc.converted.as_deref(), Some(expected.join("\n\n").as_str()));
        }
    }
}

#[test]
fn executors_agree() {
    let inputs = paths(&["x", "y", "z", "w"]);
    let sequential = run(ExecutorKind::Sequential, echo_stages(3), fast_config(), &inputs).unwrap();
    let parallel = run(ExecutorKind::Parallel, echo_stages(3), fast_config(), &inputs).unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn filtered_document_leaves_the_rest_in_order() {
    let inputs = paths(&["first", "skip-me", "second", "skip-too", "third"]);
    for kind in BOTH {
        let docs = run(kind, echo_stages(2), fast_config(), &inputs).unwrap();
        let stems: Vec<String> = docs.iter().map(|d| d.stem()).collect();
        assert_eq!(stems, vec!["first", "second", "third"], "{kind:?}");
    }
}

#[test]
fn empty_input_gives_empty_output() {
    for kind in BOTH {
        assert!(run(kind, echo_stages(2), fast_config(), &[]).unwrap().is_empty());
    }
}

// ── Setup validation ─────────────────────────────────────────────────────────

#[test]
fn parallel_rejects_non_distributable_extractor() {
    let stages = Stages::new(Arc::new(EchoExtractor {
        pages: 1,
        distributable: false,
    }));
    let err = build_executor(ExecutorKind::Parallel, stages, fast_config())
        .err()
        .expect("setup must fail");
    assert!(matches!(err, FolioError::NotDistributable { .. }), "got {err}");
}

#[test]
fn sequential_accepts_non_distributable_extractor() {
    let stages = Stages::new(Arc::new(EchoExtractor {
        pages: 2,
        distributable: false,
    }))
    .preprocessor(FakePages { pages: 2 });
    let docs = run(ExecutorKind::Sequential, stages, fast_config(), &paths(&["d"])).unwrap();
    assert_eq!(docs[0].items.len(), 2);
}

// ── Failure policy ───────────────────────────────────────────────────────────

#[test]
fn flaky_backend_recovers_within_retries() {
    for kind in BOTH {
        let stages = Stages::new(Arc::new(FlakyExtractor {
            failures: 2,
            attempts: Mutex::new(HashMap::new()),
        }))
        .preprocessor(FakePages { pages: 3 });
        let docs = run(kind, stages, fast_config(), &paths(&["doc"])).unwrap();
        assert!(docs[0]
            .items
            .iter()
            .all(|p| p.converted.as_deref() == Some("ok")));
    }
}

#[test]
fn exhausted_retries_degrade_the_page_not_the_batch() {
    let counter = Arc::new(Counting::default());
    let config = PipelineConfig::builder()
        .max_retries(1)
        .retry_backoff_ms(1)
        .progress_callback(counter.clone() as Arc<dyn PipelineProgressCallback>)
        .build()
        .unwrap();
    let stages = Stages::new(Arc::new(FlakyExtractor {
        failures: usize::MAX,
        attempts: Mutex::new(HashMap::new()),
    }))
    .preprocessor(FakePages { pages: 2 });

    let docs = run(ExecutorKind::Parallel, stages, config, &paths(&["a", "b"])).unwrap();

    assert_eq!(docs.len(), 2);
    for doc in &docs {
        assert_eq!(doc.items.len(), 2);
        assert!(doc.items.iter().all(|p| p.converted.is_none()));
        assert_eq!(doc.converted.as_deref(), Some("\n\n"));
    }
    assert_eq!(counter.queued.load(Ordering::SeqCst), 4);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 4);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 0);
    assert_eq!(counter.batch_done.load(Ordering::SeqCst), 2);
}

#[test]
fn artifact_failure_drops_only_that_document() {
    let inputs = paths(&["good-1", "broken", "good-2"]);
    for kind in BOTH {
        let stages = Stages::new(Arc::new(BrokenArtifacts)).preprocessor(FakePages { pages: 3 });
        let docs = run(kind, stages, fast_config(), &inputs).unwrap();
        let stems: Vec<String> = docs.iter().map(|d| d.stem()).collect();
        assert_eq!(stems, vec!["good-1", "good-2"], "{kind:?}");
    }
}

#[test]
fn timeout_counts_as_a_failed_attempt() {
    struct Stuck;

    #[async_trait]
    impl Extractor for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn extract(&self, entry: DocumentEntry) -> Result<DocumentEntry, StageError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(entry)
        }
    }

    let config = PipelineConfig::builder()
        .max_retries(0)
        .extract_timeout_secs(1)
        .build()
        .unwrap();
    let stages = Stages::new(Arc::new(Stuck)).preprocessor(FakePages { pages: 1 });
    let docs = run(ExecutorKind::Sequential, stages, config, &paths(&["slow"])).unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].items[0].converted.is_none());
}

// ── End to end: page images + sidecar layouts ────────────────────────────────

const PAGE0: &str = r#"[
  {"label": "Title", "bbox": [10, 10, 300, 40], "confidence": 0.98, "text": "Report"},
  {"label": "Page-header", "bbox": [10, 0, 300, 8], "confidence": 0.9, "text": "ACME confidential"},
  {"label": "Text", "bbox": [10, 50, 300, 90], "confidence": 0.95, "text": "Body & more"}
]"#;

const PAGE1: &str = r#"[
  {"label": "List-item", "bbox": [10, 10, 300, 50], "items": ["one", "two"]},
  {"label": "Table", "bbox": [10, 60, 300, 120],
   "headers": [{"row": 0, "col": 0, "text": "H1"}, {"row": 0, "col": 1, "text": "H2"}],
   "cells":   [{"row": 0, "col": 0, "text": "A"}, {"row": 0, "col": 1, "text": "B"}]}
]"#;

/// `scans/report/{page10.png, page2.png}` with layouts; natural order puts
/// `page2` first.
fn scanned_report(root: &Path) -> PathBuf {
    let doc = root.join("scans").join("report");
    fs::create_dir_all(&doc).unwrap();
    for (name, layout) in [("page2", PAGE0), ("page10", PAGE1)] {
        fs::write(doc.join(format!("{name}.png")), b"\x89PNG placeholder").unwrap();
        fs::write(doc.join(format!("{name}.json")), layout).unwrap();
    }
    doc
}

fn sidecar_stages() -> Stages {
    Stages::new(Arc::new(SidecarExtractor::new(Vocabulary::DocLayNet)))
        .preprocessor(PageImagePreprocessor::default())
}

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .output_dir(dir.join("out"))
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

#[test]
fn sidecar_pipeline_renders_markdown() {
    let root = tempfile::tempdir().unwrap();
    let doc = scanned_report(root.path());

    for kind in BOTH {
        let stages = sidecar_stages().postprocessor(LabelFilter::discard([Label::PageHeader]));
        let out = convert(&[doc.clone()], stages, config_in(root.path()), kind, &MarkdownGenerator)
            .unwrap();

        assert_eq!(out.len(), 1);
        let (reference, markdown) = &out[0];
        assert_eq!(reference.items.len(), 2);
        assert_eq!(
            markdown,
            "# Report\n\nBody & more\n\n- one\n- two\n\n\
             | H1  | H2  |\n| --- | --- |\n| A   | B   |",
            "{kind:?}"
        );
        assert!(!markdown.contains("ACME"));
    }
}

#[test]
fn sidecar_pipeline_renders_html_and_json() {
    let root = tempfile::tempdir().unwrap();
    let doc = scanned_report(root.path());

    let html = convert(
        &[doc.clone()],
        sidecar_stages(),
        config_in(root.path()),
        ExecutorKind::Sequential,
        &HtmlGenerator::default(),
    )
    .unwrap()
    .remove(0)
    .1;
    assert!(html.starts_with("<html><body>\n"));
    assert!(html.contains("<h1>Report</h1>"));
    assert!(html.contains("<p>Body &amp; more</p>"));
    assert!(html.contains("<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n<table>"));

    let json = convert(
        &[doc],
        sidecar_stages(),
        config_in(root.path()),
        ExecutorKind::Parallel,
        &JsonGenerator,
    )
    .unwrap()
    .remove(0)
    .1;
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["layout"][0]["label"], "TITLE");
    assert_eq!(items[0]["layout"][1]["label"], "PAGE_HEADER");
    assert_eq!(items[1]["layout"][0]["type"], "list_item");
    assert_eq!(
        json["converted"],
        "Report\nACME confidential\nBody & more\n\none\ntwo"
    );
}

#[test]
fn unsupported_inputs_are_filtered_at_intake() {
    let root = tempfile::tempdir().unwrap();
    let doc = scanned_report(root.path());
    let notes = root.path().join("notes.txt");
    fs::write(&notes, "not a page").unwrap();

    let out = MarkdownGenerator
        .convert(
            run(
                ExecutorKind::Parallel,
                sidecar_stages(),
                config_in(root.path()),
                &[notes, doc],
            )
            .unwrap(),
        )
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0.stem(), "report");
}

#[test]
fn missing_layout_file_drops_the_document() {
    let root = tempfile::tempdir().unwrap();
    let doc = scanned_report(root.path());
    let bare = root.path().join("bare");
    fs::create_dir_all(&bare).unwrap();
    fs::write(bare.join("page0.png"), b"\x89PNG placeholder").unwrap();

    for kind in BOTH {
        let docs = run(
            kind,
            sidecar_stages(),
            config_in(root.path()),
            &[bare.clone(), doc.clone()],
        )
        .unwrap();
        let stems: Vec<String> = docs.iter().map(|d| d.stem()).collect();
        assert_eq!(stems, vec!["report"], "{kind:?}");
    }
}

#[test]
fn convert_to_dir_writes_one_file_per_document() {
    let root = tempfile::tempdir().unwrap();
    let doc = scanned_report(root.path());

    let written = convert_to_dir(
        &[doc],
        sidecar_stages(),
        config_in(root.path()),
        ExecutorKind::Parallel,
        OutputFormat::Html,
    )
    .unwrap();

    let expected = root.path().join("out").join("report").join("report.html");
    assert_eq!(written, vec![expected.clone()]);
    let html = fs::read_to_string(&expected).unwrap();
    assert!(html.contains("<th>H1</th>"));
    assert!(root.path().join("out/report/page0.png").exists());
}

// ── Same-named inputs, bad layouts ───────────────────────────────────────────

fn one_page_doc(dir: &Path, layout: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("page0.png"), b"\x89PNG placeholder").unwrap();
    fs::write(dir.join("page0.json"), layout).unwrap();
    dir.to_path_buf()
}

#[test]
fn same_named_documents_keep_their_own_pages() {
    let root = tempfile::tempdir().unwrap();
    let a = one_page_doc(
        &root.path().join("a").join("report"),
        r#"[{"label": "Text", "bbox": [0, 0, 10, 10], "text": "from A"}]"#,
    );
    let b = one_page_doc(
        &root.path().join("b").join("report"),
        r#"[{"label": "Text", "bbox": [0, 0, 10, 10], "text": "from B"}]"#,
    );

    for kind in BOTH {
        let docs = run(kind, sidecar_stages(), config_in(root.path()), &[a.clone(), b.clone()])
            .unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.converted.as_deref().unwrap()).collect();
        assert_eq!(texts, vec!["from A", "from B"], "{kind:?}");

        let written = convert_to_dir(
            &[a.clone(), b.clone()],
            sidecar_stages(),
            config_in(root.path()),
            kind,
            OutputFormat::Markdown,
        )
        .unwrap();
        let out = root.path().join("out");
        assert_eq!(
            written,
            vec![
                out.join("report-1").join("report-1.md"),
                out.join("report-2").join("report-2.md"),
            ],
            "{kind:?}"
        );
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "from A");
        assert_eq!(fs::read_to_string(&written[1]).unwrap(), "from B");
    }
}

#[test]
fn out_of_range_table_degrades_its_page_only() {
    let root = tempfile::tempdir().unwrap();
    let good = one_page_doc(
        &root.path().join("good"),
        r#"[{"label": "Text", "bbox": [0, 0, 10, 10], "text": "fine"}]"#,
    );
    let bad = one_page_doc(
        &root.path().join("bad"),
        r#"[{"label": "Table", "bbox": [0, 0, 10, 10],
             "cells": [{"row": 0, "col": 18446744073709551615, "text": "x"}]}]"#,
    );

    for kind in BOTH {
        let docs = run(kind, sidecar_stages(), config_in(root.path()), &[good.clone(), bad.clone()])
            .unwrap();
        let stems: Vec<String> = docs.iter().map(|d| d.stem()).collect();
        assert_eq!(stems, vec!["good", "bad"], "{kind:?}");
        assert_eq!(docs[0].converted.as_deref(), Some("fine"));
        assert!(docs[1].items[0].converted.is_none(), "{kind:?}");
        assert!(docs[1].items[0].layout.is_empty());
    }
}

#[test]
fn config_threshold_and_debug_take_effect() {
    let root = tempfile::tempdir().unwrap();
    let doc = root.path().join("memo");
    fs::create_dir_all(&doc).unwrap();
    image::RgbImage::from_pixel(320, 100, image::Rgb([255, 255, 255]))
        .save(doc.join("page0.png"))
        .unwrap();
    fs::write(doc.join("page0.json"), PAGE0).unwrap();

    let config = PipelineConfig::builder()
        .output_dir(root.path().join("out"))
        .confidence_threshold(0.92)
        .debug(true)
        .build()
        .unwrap();
    let docs = run(ExecutorKind::Parallel, sidecar_stages(), config, &[doc]).unwrap();

    let labels: Vec<Label> = docs[0].items[0].layout.iter().map(|a| a.label).collect();
    assert_eq!(labels, vec![Label::Title, Label::Text]);
    assert!(root.path().join("out/memo/debug/page0.png").exists());
}
