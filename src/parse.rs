//! Resume parsing entry points.
//!
//! [`DocumentReader`] turns PDF bytes into assembled text (text layer or
//! OCR). [`ResumeParser`] adds the model call and validation on top. The
//! free functions at the bottom are one-shot conveniences that build a
//! parser per call; batch callers should build one [`ResumeParser`] and
//! clone it into each task so the provider client is shared.

use crate::config::ParseConfig;
use crate::error::{FieldViolation, PageError, PipelineError};
use crate::output::{PageText, ParseOutput, ParseStats, TextSource};
use crate::pipeline::assemble::{assemble, truncate_head};
use crate::pipeline::input::{check_pdf_magic, check_size, load_input};
use crate::pipeline::llm::{extract_candidate, CompletionModel, ProviderModel};
use crate::pipeline::ocr::{OcrEngine, RasterOcr};
use crate::pipeline::scan::{detect, ScanReport};
use crate::pipeline::text::{extract_pages, PageTextSource, PdfiumTextLayer};
use crate::pipeline::validate::validate;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Text of one document, ready for extraction.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentText {
    pub pages: Vec<PageText>,
    /// Pages joined with the configured separator.
    pub text: String,
    pub source: TextSource,
    /// Scan detection over the text layer.
    pub scan: ScanReport,
    /// OCR pages that failed and contributed empty text.
    pub failed_pages: Vec<PageError>,
    pub text_duration_ms: u64,
    pub ocr_duration_ms: u64,
}

/// Reads the text of a PDF, falling back to OCR for scanned documents.
#[derive(Clone)]
pub struct DocumentReader {
    config: Arc<ParseConfig>,
    text_layer: Arc<dyn PageTextSource>,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl DocumentReader {
    pub fn new(
        config: Arc<ParseConfig>,
        text_layer: Arc<dyn PageTextSource>,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        Self {
            config,
            text_layer,
            ocr,
        }
    }

    /// pdfium text layer plus the OCR backend selected in `config`.
    ///
    /// `provider` is only needed for the vision OCR backend.
    pub fn from_config(
        config: Arc<ParseConfig>,
        provider: Option<Arc<dyn LLMProvider>>,
    ) -> Result<Self, PipelineError> {
        let ocr = RasterOcr::from_settings(&config.ocr, provider)?
            .map(|engine| Arc::new(engine) as Arc<dyn OcrEngine>);
        Ok(Self::new(config, Arc::new(PdfiumTextLayer), ocr))
    }

    /// Extract the text of one document.
    pub async fn read(&self, bytes: &[u8], document: &str) -> Result<DocumentText, PipelineError> {
        let config = &self.config;
        check_size(bytes, config.max_document_bytes, document)?;
        check_pdf_magic(bytes, document)?;

        let shared: Arc<[u8]> = Arc::from(bytes);

        let text_start = Instant::now();
        let mut pages = extract_pages(
            Arc::clone(&self.text_layer),
            Arc::clone(&shared),
            config.password.clone(),
            document.to_string(),
        )
        .await?;
        let text_duration_ms = text_start.elapsed().as_millis() as u64;

        if pages.len() > config.max_pages {
            return Err(PipelineError::DocumentTooLarge {
                document: document.to_string(),
                actual: pages.len(),
                limit: config.max_pages,
                unit: "pages",
            });
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(document, pages.len());
        }

        let scan = detect(&pages, &config.scan);
        debug!(
            "{}: {} chars over {} pages, {} empty",
            document, scan.total_chars, scan.pages, scan.empty_pages
        );

        let mut failed_pages = Vec::new();
        let mut ocr_duration_ms = 0;
        let source = match (&self.ocr, scan.needs_ocr) {
            (Some(engine), true) => {
                info!("{}: no usable text layer ({:?}), running OCR", document, scan.reason);
                let ocr_start = Instant::now();
                let outcome = engine.recognize_document(shared, document, config).await?;
                ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
                pages = outcome.pages;
                failed_pages = outcome.failures;
                TextSource::Ocr
            }
            (None, true) => {
                warn!(
                    "{}: looks scanned ({:?}) but OCR is disabled; using the text layer",
                    document, scan.reason
                );
                TextSource::TextLayer
            }
            (_, false) => {
                info!("{}: using the text layer", document);
                TextSource::TextLayer
            }
        };

        if let Some(ref cb) = config.progress_callback {
            cb.on_text_source(document, source);
        }

        let text = assemble(&pages, &config.page_separator);

        Ok(DocumentText {
            pages,
            text,
            source,
            scan,
            failed_pages,
            text_duration_ms,
            ocr_duration_ms,
        })
    }
}

/// A reusable resume parser: text extraction, model call and validation.
///
/// Cheap to clone; clones share the provider client.
///
/// # Example
/// ```rust,no_run
/// use edgequake_resume::{ParseConfig, ResumeParser};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let parser = ResumeParser::new(ParseConfig::default())?;
/// let bytes = std::fs::read("cv.pdf")?;
/// let output = parser.parse(&bytes, "cv.pdf").await?;
/// println!("{}", serde_json::to_string_pretty(&output.record)?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResumeParser {
    config: Arc<ParseConfig>,
    reader: DocumentReader,
    model: Arc<dyn CompletionModel>,
}

impl ResumeParser {
    /// Build a parser, resolving the LLM provider from `config` and the
    /// environment.
    pub fn new(config: ParseConfig) -> Result<Self, PipelineError> {
        let config = Arc::new(config);
        let (provider, label) = resolve_provider(&config)?;
        info!("Using extraction model {}", label);
        let reader = DocumentReader::from_config(Arc::clone(&config), Some(Arc::clone(&provider)))?;
        let model: Arc<dyn CompletionModel> = Arc::new(ProviderModel::new(provider, label));
        Ok(Self {
            config,
            reader,
            model,
        })
    }

    /// Assemble a parser from explicit components.
    pub fn from_parts(
        config: ParseConfig,
        text_layer: Arc<dyn PageTextSource>,
        ocr: Option<Arc<dyn OcrEngine>>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        let config = Arc::new(config);
        let reader = DocumentReader::new(Arc::clone(&config), text_layer, ocr);
        Self {
            config,
            reader,
            model,
        }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    pub fn reader(&self) -> &DocumentReader {
        &self.reader
    }

    /// Extract the document text without calling the model.
    pub async fn read_text(&self, bytes: &[u8], document: &str) -> Result<DocumentText, PipelineError> {
        self.reader.read(bytes, document).await
    }

    /// Parse one PDF held in memory. `document` labels logs and errors.
    pub async fn parse(&self, bytes: &[u8], document: &str) -> Result<ParseOutput, PipelineError> {
        let start = Instant::now();
        info!("Parsing resume: {} ({} bytes)", document, bytes.len());

        let result = async {
            let doc = self.reader.read(bytes, document).await?;
            // Page markers make the assembled text non-empty even when
            // every page came back blank.
            if doc.pages.iter().all(PageText::is_blank) {
                warn!("{}: no page yielded any text", document);
                return Err(nothing_extracted());
            }
            let stats = ParseStats {
                total_pages: doc.pages.len(),
                text_source: Some(doc.source),
                failed_pages: doc.failed_pages,
                text_duration_ms: doc.text_duration_ms,
                ocr_duration_ms: doc.ocr_duration_ms,
                ..Default::default()
            };
            self.extract(&doc.text, document, stats, start).await
        }
        .await;

        self.report(document, &result);
        result
    }

    /// Load a path or URL, then [`parse`](Self::parse) it.
    pub async fn parse_input(&self, input: &str) -> Result<ParseOutput, PipelineError> {
        let loaded = load_input(
            input,
            self.config.download_timeout_secs,
            self.config.max_document_bytes,
        )
        .await?;
        self.parse(&loaded.bytes, &loaded.label).await
    }

    /// Run extraction and validation on already-extracted resume text.
    pub async fn parse_text(&self, text: &str) -> Result<ParseOutput, PipelineError> {
        let start = Instant::now();
        let result = self.extract(text, "<text>", ParseStats::default(), start).await;
        self.report("<text>", &result);
        result
    }

    async fn extract(
        &self,
        text: &str,
        document: &str,
        mut stats: ParseStats,
        start: Instant,
    ) -> Result<ParseOutput, PipelineError> {
        let config = &self.config;
        stats.assembled_chars = text.chars().count();

        if text.trim().is_empty() {
            return Err(nothing_extracted());
        }

        let (input, truncated) = truncate_head(text, config.max_input_chars);
        if truncated {
            warn!(
                "{}: text truncated from {} to {} chars",
                document,
                stats.assembled_chars,
                input.chars().count()
            );
        }
        stats.truncated = truncated;

        if let Some(ref cb) = config.progress_callback {
            cb.on_extraction_start(document, input.chars().count());
        }

        let candidate = extract_candidate(self.model.as_ref(), input, truncated, config).await?;
        stats.input_tokens = candidate.input_tokens;
        stats.output_tokens = candidate.output_tokens;
        stats.retries = candidate.retries;
        stats.llm_duration_ms = candidate.duration_ms;

        let validated = validate(&candidate.raw, config.industry_vocabulary.as_deref())?;
        stats.repaired = validated.repaired;
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        Ok(ParseOutput {
            record: validated.record,
            warnings: validated.warnings,
            stats,
        })
    }

    fn report(&self, document: &str, result: &Result<ParseOutput, PipelineError>) {
        match result {
            Ok(out) => {
                info!(
                    "{}: parsed via {} in {}ms ({} warnings)",
                    document,
                    out.stats
                        .text_source
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "text input".into()),
                    out.stats.total_duration_ms,
                    out.warnings.len()
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_complete(document, out.warnings.len());
                }
            }
            Err(e) => {
                warn!("{}: failed at {} stage: {}", document, e.stage(), e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_error(document, e.to_string());
                }
            }
        }
    }
}

fn nothing_extracted() -> PipelineError {
    PipelineError::SchemaViolation {
        fields: ["full_name", "email", "phone"]
            .iter()
            .map(|p| FieldViolation::new(*p, "no text could be extracted from the document"))
            .collect(),
    }
}

// ── One-shot entry points ────────────────────────────────────────────────

/// Parse one PDF held in memory.
pub async fn parse_resume(
    bytes: &[u8],
    filename: &str,
    config: &ParseConfig,
) -> Result<ParseOutput, PipelineError> {
    ResumeParser::new(config.clone())?.parse(bytes, filename).await
}

/// Parse a local PDF file or an HTTP(S) URL.
pub async fn parse_resume_file(
    input: impl AsRef<str>,
    config: &ParseConfig,
) -> Result<ParseOutput, PipelineError> {
    ResumeParser::new(config.clone())?
        .parse_input(input.as_ref())
        .await
}

/// Synchronous wrapper around [`parse_resume_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn parse_resume_sync(
    input: impl AsRef<str>,
    config: &ParseConfig,
) -> Result<ParseOutput, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(parse_resume_file(input, config))
}

/// Parse a resume and write the record as pretty JSON to `output_path`.
pub async fn parse_resume_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ParseConfig,
) -> Result<ParseStats, PipelineError> {
    let output = parse_resume_file(input, config).await?;
    write_json(output_path.as_ref(), &output.record).await?;
    Ok(output.stats)
}

/// Serialise `value` as pretty JSON and write it atomically.
///
/// The body goes to a uniquely named temp file in the target directory,
/// which is then renamed over `path`; concurrent writers never share a
/// temp file.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let io_err = |source: std::io::Error| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut body = serde_json::to_vec_pretty(value)
        .map_err(|e| PipelineError::Internal(format!("JSON serialisation failed: {e}")))?;
    body.push(b'\n');

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Write task panicked: {}", e)))?
    .map_err(io_err)
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider` (pre-built client)
/// 2. `config.provider_name` + `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env` auto-detection
///
/// Returns the provider and a `provider/model` label for logs.
fn resolve_provider(config: &ParseConfig) -> Result<(Arc<dyn LLMProvider>, String), PipelineError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), "custom".to_string()));
    }

    if let Some(ref name) = config.provider_name {
        return Ok((create_provider(name, model)?, format!("{name}/{model}")));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let label = format!("{prov}/{env_model}");
            return Ok((create_provider(&prov, &env_model)?, label));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok((create_provider("openai", model)?, format!("openai/{model}")));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResumeRecord;

    #[tokio::test]
    async fn write_json_is_atomic_and_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("jane.json");
        let record = ResumeRecord {
            full_name: Some("Jane".into()),
            ..Default::default()
        };
        write_json(&path, &record).await.unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("\n  \"full_name\": \"Jane\""));
        let back: ResumeRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(back, record);

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("jane.json")]);
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_directory_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        // A leftover file with the old fixed temp name must be left alone.
        let stale = dir.path().join("jane.json.tmp");
        std::fs::write(&stale, "stale").unwrap();

        let records: Vec<ResumeRecord> = (0..8)
            .map(|i| ResumeRecord {
                full_name: Some(format!("Jane {i}")),
                ..Default::default()
            })
            .collect();
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| dir.path().join(format!("jane-{i}.json")))
            .collect();

        let writes = paths
            .iter()
            .zip(&records)
            .map(|(path, record)| write_json(path, record));
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        for (path, record) in paths.iter().zip(&records) {
            let back: ResumeRecord =
                serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(&back, record);
        }
        assert_eq!(std::fs::read_to_string(&stale).unwrap(), "stale");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 9);
    }
}
