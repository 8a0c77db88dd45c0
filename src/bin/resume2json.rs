//! CLI binary for edgequake-resume.
//!
//! A thin shim over the library crate: maps CLI flags to `ParseConfig`,
//! fans documents out with bounded concurrency and writes one JSON record
//! per resume.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_resume::pipeline::input::{expand_inputs, extract_filename, is_url, load_input};
use edgequake_resume::{
    write_json, DocumentReader, OcrBackendKind, OcrSettings, PageSeparator, ParseConfig,
    ParseProgressCallback, PipelineError, ProgressCallback, ResumeParser, ScanThresholds,
    TextSource,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

fn shorten(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar over the whole batch; per-document lines are printed above it
/// as documents finish, in completion order.
struct CliProgressCallback {
    bar: ProgressBar,
    ocr_documents: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total_documents: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} resumes  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total_documents as u64);
        bar.set_style(style);
        bar.set_prefix("Parsing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            ocr_documents: AtomicUsize::new(0),
        })
    }
}

impl ParseProgressCallback for CliProgressCallback {
    fn on_text_source(&self, document: &str, source: TextSource) {
        if source == TextSource::Ocr {
            self.ocr_documents.fetch_add(1, Ordering::SeqCst);
            self.bar.set_message(format!("OCR {document}"));
        }
    }

    fn on_ocr_page(&self, document: &str, page_num: usize, total_pages: usize, _chars: usize) {
        self.bar
            .set_message(format!("OCR {document} {page_num}/{total_pages}"));
    }

    fn on_ocr_page_error(&self, document: &str, page_num: usize, _total: usize, error: String) {
        self.bar.println(format!(
            "  {} {} page {}: {}",
            cyan("⚠"),
            document,
            page_num,
            dim(&shorten(&error, 80))
        ));
    }

    fn on_extraction_start(&self, document: &str, _input_chars: usize) {
        self.bar.set_message(format!("extracting {document}"));
    }

    fn on_document_complete(&self, document: &str, warnings: usize) {
        let note = if warnings > 0 {
            dim(&format!("{warnings} field(s) repaired"))
        } else {
            String::new()
        };
        self.bar
            .println(format!("  {} {:<40} {}", green("✓"), document, note));
        self.bar.inc(1);
    }

    fn on_document_error(&self, document: &str, error: String) {
        self.bar.println(format!(
            "  {} {:<40} {}",
            red("✗"),
            document,
            red(&shorten(&error, 100))
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One resume to stdout
  resume2json cv.pdf

  # A folder of resumes, 8 at a time, one <name>.json per resume
  resume2json ./inbox -o ./records --concurrency 8

  # Resume from a URL with a specific model
  resume2json https://example.com/jane-doe.pdf --provider openai --model gpt-4.1-mini

  # Restrict industries to a closed vocabulary
  resume2json cv.pdf --industries wind,solar,oil_n_gas,offshore

  # Check text extraction only (native vs OCR), no model call
  resume2json --text-only ./inbox

  # OCR scanned resumes with the vision model instead of tesseract
  resume2json scan.pdf --ocr vision

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RESUME2JSON_*           Any flag below, e.g. RESUME2JSON_CONCURRENCY=8

EXIT STATUS:
  0  every resume produced a record
  1  at least one resume failed (see the summary)
"#;

/// Parse resume PDFs into structured JSON records.
#[derive(Parser, Debug)]
#[command(
    name = "resume2json",
    version,
    about = "Parse resume PDFs into structured JSON records using LLMs",
    long_about = "Parse resume PDFs (local files, directories or URLs) into validated JSON \
records. Text PDFs are read from their text layer; scanned PDFs go through OCR. Supports \
OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files, directories of PDFs, or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write one <name>.json per resume into this directory.
    /// Without it a single resume is printed to stdout.
    #[arg(short, long, env = "RESUME2JSON_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Resumes processed concurrently.
    #[arg(short, long, env = "RESUME2JSON_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    concurrency: u16,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// OCR backend for scanned resumes.
    #[arg(long, env = "RESUME2JSON_OCR", value_enum, default_value = "tesseract")]
    ocr: OcrArg,

    /// Path to the tesseract binary.
    #[arg(long, env = "RESUME2JSON_TESSERACT", default_value = "tesseract")]
    tesseract_path: PathBuf,

    /// Tesseract language(s), e.g. eng or eng+nor.
    #[arg(long, env = "RESUME2JSON_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "RESUME2JSON_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Minimum text-layer characters before a document counts as text-bearing.
    #[arg(long, env = "RESUME2JSON_MIN_CHARS", default_value_t = 32)]
    min_chars: usize,

    /// Share of empty pages above which a document is treated as scanned.
    #[arg(long, env = "RESUME2JSON_MAX_EMPTY_RATIO", default_value_t = 0.5)]
    max_empty_ratio: f32,

    /// Characters of resume text sent to the model (head kept).
    #[arg(long, env = "RESUME2JSON_MAX_INPUT_CHARS", default_value_t = 48_000)]
    max_input_chars: usize,

    /// Reject resumes with more pages than this.
    #[arg(long, env = "RESUME2JSON_MAX_PAGES", default_value_t = 50)]
    max_pages: usize,

    /// Comma-separated closed industry vocabulary.
    #[arg(long, env = "RESUME2JSON_INDUSTRIES", value_delimiter = ',')]
    industries: Option<Vec<String>>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "RESUME2JSON_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "RESUME2JSON_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max model output tokens per resume.
    #[arg(long, env = "RESUME2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries on transient model failures.
    #[arg(long, env = "RESUME2JSON_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Model call timeout in seconds.
    #[arg(long, env = "RESUME2JSON_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RESUME2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Only extract text (native vs OCR, per-page chars); no model call.
    #[arg(long)]
    text_only: bool,

    /// Write the record together with warnings and stats.
    #[arg(long, env = "RESUME2JSON_WITH_STATS")]
    with_stats: bool,

    /// Disable progress bar.
    #[arg(long, env = "RESUME2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RESUME2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RESUME2JSON_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    Tesseract,
    Vision,
    Disabled,
}

impl From<OcrArg> for OcrBackendKind {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Tesseract => OcrBackendKind::Tesseract,
            OcrArg::Vision => OcrBackendKind::VisionModel,
            OcrArg::Disabled => OcrBackendKind::Disabled,
        }
    }
}

/// Outcome of one document in a batch.
struct DocResult {
    input: String,
    outcome: Result<Option<PathBuf>, PipelineError>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let inputs = expand_inputs(&cli.inputs).context("Failed to expand inputs")?;
    if inputs.is_empty() {
        anyhow::bail!("No PDF files found in the given inputs");
    }
    let to_stdout = cli.output_dir.is_none() && inputs.len() == 1;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters; keep library
    // logs to errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.text_only && !to_stdout;
    let filter = if cli.verbose {
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

    let progress: Option<Arc<CliProgressCallback>> = if show_progress {
        Some(CliProgressCallback::new(inputs.len()))
    } else {
        None
    };

    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )
    .await?;

    // ── Text-only mode ───────────────────────────────────────────────────
    if cli.text_only {
        let reader = if config.ocr.backend == OcrBackendKind::VisionModel {
            ResumeParser::new(config)
                .context("Failed to initialise the LLM provider")?
                .reader()
                .clone()
        } else {
            DocumentReader::from_config(Arc::new(config), None)
                .context("Failed to initialise the OCR backend")?
        };
        return run_text_only(&reader, &inputs, &cli).await;
    }

    let parser = ResumeParser::new(config).context("Failed to initialise the LLM provider")?;

    // ── Run batch ────────────────────────────────────────────────────────
    let start = Instant::now();
    let output_dir = cli.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let with_stats = cli.with_stats;

    let stems = output_stems(&inputs);

    let results: Vec<DocResult> = stream::iter(inputs.iter().cloned().zip(stems))
        .map(|(input, stem)| {
            let parser = parser.clone();
            let path = output_dir.join(format!("{stem}.json"));
            async move {
                let outcome = process_one(&parser, &input, &path, to_stdout, with_stats).await;
                DocResult { input, outcome }
            }
        })
        .buffer_unordered(cli.concurrency as usize)
        .collect()
        .await;

    if let Some(cb) = progress {
        cb.bar.finish_and_clear();
        let ocr = cb.ocr_documents.load(Ordering::SeqCst);
        if ocr > 0 && !cli.quiet {
            eprintln!("{} {} resume(s) needed OCR", dim("ℹ"), ocr);
        }
    }

    // ── Summary ──────────────────────────────────────────────────────────
    let failed: Vec<&DocResult> = results.iter().filter(|r| r.outcome.is_err()).collect();
    let succeeded = results.len() - failed.len();

    if !cli.quiet && !to_stdout {
        eprintln!(
            "{} {}/{} resumes parsed in {:.1}s  →  {}",
            if failed.is_empty() { green("✔") } else { cyan("⚠") },
            bold(&succeeded.to_string()),
            results.len(),
            start.elapsed().as_secs_f64(),
            bold(&output_dir.display().to_string()),
        );
    }
    for r in &failed {
        if let Err(ref e) = r.outcome {
            eprintln!(
                "  {} {}  {}  {}",
                red("✘"),
                r.input,
                dim(&format!("[{}]", e.stage())),
                e
            );
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("{} of {} resume(s) failed", failed.len(), results.len());
    }
    Ok(())
}

/// File stem an input's record is written under, before deduplication.
fn input_stem(input: &str) -> String {
    let name = if is_url(input) {
        extract_filename(input)
    } else {
        input.to_string()
    };
    Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "resume".to_string())
}

/// One output stem per input, unique within the batch.
///
/// Inputs sharing a stem (`a/cv.pdf`, `b/cv.pdf`, two URLs ending in
/// `cv.pdf`) get `-2`, `-3`, ... suffixes in input order. Comparison ignores
/// case so the names also stay distinct on case-insensitive filesystems.
fn output_stems(inputs: &[String]) -> Vec<String> {
    let stems: Vec<String> = inputs.iter().map(|i| input_stem(i)).collect();
    let natural: HashSet<String> = stems.iter().map(|s| s.to_lowercase()).collect();
    let mut taken: HashSet<String> = HashSet::new();

    stems
        .into_iter()
        .map(|stem| {
            let mut candidate = stem.clone();
            let mut n = 2;
            while taken.contains(&candidate.to_lowercase())
                || (candidate != stem && natural.contains(&candidate.to_lowercase()))
            {
                candidate = format!("{stem}-{n}");
                n += 1;
            }
            taken.insert(candidate.to_lowercase());
            candidate
        })
        .collect()
}

/// Parse one input and write (or print) its record to `path`.
async fn process_one(
    parser: &ResumeParser,
    input: &str,
    path: &Path,
    to_stdout: bool,
    with_stats: bool,
) -> Result<Option<PathBuf>, PipelineError> {
    let config = parser.config();
    let loaded =
        match load_input(input, config.download_timeout_secs, config.max_document_bytes).await {
            Ok(loaded) => loaded,
            Err(e) => {
                // The parser never saw this one; keep the bar in step.
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_error(input, e.to_string());
                }
                return Err(e);
            }
        };
    let output = parser.parse(&loaded.bytes, &loaded.label).await?;

    if to_stdout {
        let json = if with_stats {
            serde_json::to_string_pretty(&output)
        } else {
            serde_json::to_string_pretty(&output.record)
        }
        .map_err(|e| PipelineError::Internal(format!("JSON serialisation failed: {e}")))?;
        println!("{json}");
        return Ok(None);
    }

    if with_stats {
        write_json(path, &output).await?;
    } else {
        write_json(path, &output.record).await?;
    }
    Ok(Some(path.to_path_buf()))
}

/// Print how each document's text would be obtained, without the model.
async fn run_text_only(reader: &DocumentReader, inputs: &[String], cli: &Cli) -> Result<()> {
    let mut failures = 0usize;

    for input in inputs {
        let result = async {
            let loaded =
                load_input(input, cli.download_timeout, usize::MAX).await?;
            reader.read(&loaded.bytes, &loaded.label).await
        }
        .await;

        match result {
            Ok(doc) => {
                let source = match doc.source {
                    TextSource::TextLayer => green("text layer"),
                    TextSource::Ocr => cyan("ocr"),
                };
                println!(
                    "{}  {}  {} pages  {} chars",
                    bold(input),
                    source,
                    doc.pages.len(),
                    doc.scan.total_chars
                );
                for page in &doc.pages {
                    println!(
                        "    page {:>3}  {:>6} chars",
                        page.index + 1,
                        page.char_count()
                    );
                }
                for e in &doc.failed_pages {
                    println!("    {} {}", red("✗"), e);
                }
                if cli.verbose {
                    println!("{}", dim(&doc.text));
                }
            }
            Err(e) => {
                failures += 1;
                println!("{}  {} {}", bold(input), red("✗"), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} document(s) could not be read", failures, inputs.len());
    }
    Ok(())
}

/// Map CLI args to `ParseConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ParseConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ParseConfig::builder()
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .scan_thresholds(ScanThresholds {
            min_total_chars: cli.min_chars,
            max_empty_page_ratio: cli.max_empty_ratio,
        })
        .ocr(OcrSettings {
            backend: cli.ocr.into(),
            tesseract_path: cli.tesseract_path.clone(),
            language: cli.ocr_lang.clone(),
            timeout_secs: cli.ocr_timeout,
            ..Default::default()
        })
        .max_input_chars(cli.max_input_chars)
        .max_pages(cli.max_pages)
        .page_separator(PageSeparator::Marker);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref industries) = cli.industries {
        builder = builder.industry_vocabulary(industries.iter().map(|s| s.trim().to_string()));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
