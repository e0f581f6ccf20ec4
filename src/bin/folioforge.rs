//! CLI binary for folioforge.
//!
//! A thin shim over the library crate: maps flags to [`Stages`] and
//! [`PipelineConfig`], runs the chosen executor, and prints or writes the
//! rendered documents.

use anyhow::{Context, Result};
use clap::Parser;
use folioforge::executor::build_executor;
use folioforge::pipeline::extract::Extractor;
use folioforge::pipeline::postprocess::LabelFilter;
use folioforge::pipeline::preprocess::PageImagePreprocessor;
use folioforge::pipeline::sidecar::SidecarExtractor;
use folioforge::pipeline::vision::VisionExtractor;
use folioforge::{
    convert_to_dir, DocumentReference, ExecutorKind, Label, OutputFormat, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, Stages, Vocabulary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
/// Pages may finish in any order under the parallel executor.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Keyed by (document, page) since page numbers repeat across documents.
    start_times: Mutex<HashMap<(PathBuf, usize), Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Collecting pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }

    fn elapsed(&self, document: &Path, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&(document.to_path_buf(), page_num)))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn short_name(document: &Path) -> String {
    document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| document.display().to_string())
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} document(s)…"))
        ));
    }

    fn on_extraction_start(&self, total_pages: usize) {
        if self.bar.length().unwrap_or(0) == 0 {
            self.activate_bar();
        }
        self.bar.inc_length(total_pages as u64);
    }

    fn on_page_start(&self, document: &Path, page_num: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert((document.to_path_buf(), page_num), Instant::now());
        }
        self.bar
            .set_message(format!("{} p{page_num}", short_name(document)));
    }

    fn on_page_complete(&self, document: &Path, page_num: usize, text_len: usize) {
        let secs = self.elapsed(document, page_num);
        self.bar.println(format!(
            "  {} {:<24} p{:<4}  {:<8}  {}",
            green("✓"),
            short_name(document),
            page_num,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, document: &Path, page_num: usize, error: &str) {
        let secs = self.elapsed(document, page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<24} p{:<4}  {}  {}",
            red("✗"),
            short_name(document),
            page_num,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, documents: usize, degraded_pages: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if degraded_pages == 0 && errors == 0 {
            eprintln!(
                "{} {} document(s) converted",
                green("✔"),
                bold(&documents.to_string())
            );
        } else {
            eprintln!(
                "{} {} document(s) converted  ({} page error(s), {} degraded)",
                if documents == 0 { red("✘") } else { cyan("⚠") },
                bold(&documents.to_string()),
                red(&errors.to_string()),
                red(&degraded_pages.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Sidecar layouts (page0.png + page0.json), Markdown to stdout
  folioforge scans/report

  # Several documents in parallel, DocLayNet labels, HTML files on disk
  folioforge --executor parallel --workers 8 --vocabulary doclaynet \
             --format html --write -o out scans/a scans/b

  # Vision LLM extraction of a single page image
  folioforge --extractor vision --model gpt-4.1-mini page.png

  # Keep only body content, drop low-confidence areas, draw overlays
  folioforge --discard page_header,page_footer --confidence-threshold 0.4 \
             --debug scans/report

INPUTS:
  A directory of page images (page0.png, page1.png, … in natural order)
  or a single page image. The sidecar extractor reads <page>.json next to
  each page: a JSON array of {label, bbox: [x0, y0, x1, y1], confidence,
  text, …} blocks in the selected vocabulary.

VOCABULARIES:
  doclaynet, d4la, docstructbench, docling, marker, generic

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key (vision extractor)
  FOLIOFORGE_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  FOLIOFORGE_MODEL          Override model ID
  RUST_LOG                  Override log filter
"#;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExecutorArg {
    Sequential,
    Parallel,
}

impl From<ExecutorArg> for ExecutorKind {
    fn from(v: ExecutorArg) -> Self {
        match v {
            ExecutorArg::Sequential => ExecutorKind::Sequential,
            ExecutorArg::Parallel => ExecutorKind::Parallel,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExtractorArg {
    /// Layout from `<page>.json` sidecar files.
    Sidecar,
    /// Layout and text from a vision LLM.
    Vision,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Markdown,
    Html,
    Json,
    Text,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Text => OutputFormat::Text,
        }
    }
}

fn parse_vocabulary(s: &str) -> Result<Vocabulary, String> {
    Vocabulary::from_name(s).ok_or_else(|| format!("unknown vocabulary '{s}'"))
}

fn parse_label(s: &str) -> Result<Label, String> {
    Label::parse(s).ok_or_else(|| format!("unknown label '{s}'"))
}

/// Convert page images into Markdown, HTML or JSON.
#[derive(Parser, Debug)]
#[command(
    name = "folioforge",
    version,
    about = "Convert page images into Markdown, HTML or JSON",
    long_about = "Run documents through a preprocess → extract → postprocess pipeline and render \
the result. Layout comes from sidecar JSON files in any supported label vocabulary, or from a \
vision LLM via edgequake-llm (OpenAI, Anthropic, Gemini, Ollama, …).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document directories or single page images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Executor: sequential or parallel.
    #[arg(long, env = "FOLIOFORGE_EXECUTOR", value_enum, default_value = "sequential")]
    executor: ExecutorArg,

    /// Extractor: sidecar or vision.
    #[arg(long, env = "FOLIOFORGE_EXTRACTOR", value_enum, default_value = "sidecar")]
    extractor: ExtractorArg,

    /// Label vocabulary of the sidecar files.
    #[arg(long, env = "FOLIOFORGE_VOCABULARY", default_value = "generic",
          value_parser = parse_vocabulary)]
    vocabulary: Vocabulary,

    /// Output format.
    #[arg(short, long, env = "FOLIOFORGE_FORMAT", value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Artifact root: page copies, crops, overlays and written outputs.
    #[arg(short, long, env = "FOLIOFORGE_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Write one file per document under the output directory instead of stdout.
    #[arg(short, long)]
    write: bool,

    /// Worker threads for the parallel executor.
    #[arg(long, env = "FOLIOFORGE_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Retries per page on extraction failure.
    #[arg(long, env = "FOLIOFORGE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt extraction timeout in seconds.
    #[arg(long, env = "FOLIOFORGE_TIMEOUT")]
    timeout: Option<u64>,

    /// Drop areas below this confidence (0–1).
    #[arg(long, env = "FOLIOFORGE_CONFIDENCE", default_value_t = 0.0)]
    confidence_threshold: f64,

    /// Keep only these labels (comma-separated, e.g. text,table).
    #[arg(long, value_delimiter = ',', value_parser = parse_label)]
    keep: Vec<Label>,

    /// Drop these labels (comma-separated, e.g. page_header,page_footer).
    #[arg(long, value_delimiter = ',', value_parser = parse_label)]
    discard: Vec<Label>,

    /// Draw layout overlays under <output-dir>/<doc>/debug and log at debug level.
    #[arg(long)]
    debug: bool,

    /// LLM provider for the vision extractor.
    #[arg(long, env = "FOLIOFORGE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model for the vision extractor.
    #[arg(long, env = "FOLIOFORGE_MODEL")]
    model: Option<String>,

    /// Disable the progress bar.
    #[arg(long, env = "FOLIOFORGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs unless verbose or debug.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose || cli.debug {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    let stages = build_stages(&cli)?;
    let kind = ExecutorKind::from(cli.executor);
    let format = OutputFormat::from(cli.format);

    // ── Run ──────────────────────────────────────────────────────────────
    if cli.write {
        let written = convert_to_dir(&cli.inputs, stages, config, kind, format)
            .context("Conversion failed")?;
        if !cli.quiet {
            for path in &written {
                eprintln!("  {}  {}", green("→"), bold(&path.display().to_string()));
            }
        }
        return Ok(());
    }

    let executor = build_executor(kind, stages, config).context("Invalid pipeline")?;
    let documents = executor.execute(&cli.inputs).context("Conversion failed")?;
    let rendered = format.render(documents).context("Rendering failed")?;

    let stdout = io::stdout();
    print_documents(&mut stdout.lock(), rendered, format)
}

/// Write rendered documents to `out`. Several non-JSON documents are
/// separated by plain `==> path <==` lines, never styled, since stdout is
/// usually redirected.
fn print_documents(
    out: &mut impl Write,
    rendered: Vec<(DocumentReference, String)>,
    format: OutputFormat,
) -> Result<()> {
    let multiple = rendered.len() > 1;
    for (doc, text) in rendered {
        if multiple && !matches!(format, OutputFormat::Json) {
            writeln!(out, "==> {} <==", doc.path.display()).context("Failed to write to stdout")?;
        }
        out.write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            out.write_all(b"\n").context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .workers(cli.workers)
        .max_retries(cli.max_retries)
        .output_dir(&cli.output_dir)
        .confidence_threshold(cli.confidence_threshold)
        .debug(cli.debug);

    if let Some(secs) = cli.timeout {
        builder = builder.extract_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Assemble the stage chain: intake, extractor, then label filters.
/// The confidence filter and overlays follow from the config.
fn build_stages(cli: &Cli) -> Result<Stages> {
    let extractor: Arc<dyn Extractor> = match cli.extractor {
        ExtractorArg::Sidecar => Arc::new(SidecarExtractor::new(cli.vocabulary)),
        ExtractorArg::Vision => Arc::new(
            VisionExtractor::from_env(cli.provider.as_deref(), cli.model.as_deref())
                .context("Failed to configure the vision extractor")?,
        ),
    };

    let mut stages = Stages::new(extractor).preprocessor(PageImagePreprocessor::default());
    if !cli.keep.is_empty() {
        stages = stages.postprocessor(LabelFilter::keep(cli.keep.iter().copied()));
    }
    if !cli.discard.is_empty() {
        stages = stages.postprocessor(LabelFilter::discard(cli.discard.iter().copied()));
    }
    Ok(stages)
}
