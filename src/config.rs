//! Configuration types for resume parsing.
//!
//! All pipeline behaviour is controlled through [`ParseConfig`], built via
//! its [`ParseConfigBuilder`]. One struct is cloned into every concurrent
//! document run, so it holds only immutable knobs and `Arc`-shared handles.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one or many resume parses.
///
/// # Example
/// ```rust
/// use edgequake_resume::{ParseConfig, ScanThresholds};
///
/// let config = ParseConfig::builder()
///     .model("gpt-4.1-mini")
///     .scan_thresholds(ScanThresholds { min_total_chars: 64, max_empty_page_ratio: 0.5 })
///     .max_input_chars(32_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.0.
    ///
    /// Extraction is transcription into a schema; any creativity shows up as
    /// invented employers and dates.
    pub temperature: f32,

    /// Maximum tokens the model may generate for one record. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a transient model failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-model-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom extraction instruction. If None, uses the built-in contract.
    pub system_prompt: Option<String>,

    /// When to fall back from the text layer to OCR.
    pub scan: ScanThresholds,

    /// OCR backend and its limits.
    pub ocr: OcrSettings,

    /// Assembled-text budget in characters sent to the model. Default: 48 000.
    ///
    /// Longer documents keep their head: resumes front-load identity and
    /// summary information.
    pub max_input_chars: usize,

    /// Reject documents larger than this many bytes. Default: 20 MiB.
    pub max_document_bytes: usize,

    /// Reject documents with more pages than this. Default: 50.
    pub max_pages: usize,

    /// Separator inserted between pages of the assembled text.
    pub page_separator: PageSeparator,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Closed industry vocabulary. When set, the prompt lists it and
    /// out-of-vocabulary values are dropped during validation.
    pub industry_vocabulary: Option<Vec<String>>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            scan: ScanThresholds::default(),
            ocr: OcrSettings::default(),
            max_input_chars: 48_000,
            max_document_bytes: 20 * 1024 * 1024,
            max_pages: 50,
            page_separator: PageSeparator::default(),
            password: None,
            industry_vocabulary: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("scan", &self.scan)
            .field("ocr", &self.ocr)
            .field("max_input_chars", &self.max_input_chars)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("max_pages", &self.max_pages)
            .field("page_separator", &self.page_separator)
            .field("industry_vocabulary", &self.industry_vocabulary)
            .finish()
    }
}

impl ParseConfig {
    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Upper bound accepted for [`ParseConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Builder for [`ParseConfig`].
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
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

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn scan_thresholds(mut self, scan: ScanThresholds) -> Self {
        self.config.scan = scan;
        self
    }

    pub fn ocr(mut self, ocr: OcrSettings) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackendKind) -> Self {
        self.config.ocr.backend = backend;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    pub fn max_document_bytes(mut self, n: usize) -> Self {
        self.config.max_document_bytes = n;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn industry_vocabulary<I, S>(mut self, vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.industry_vocabulary = Some(vocabulary.into_iter().map(Into::into).collect());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParseConfig, PipelineError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.scan.max_empty_page_ratio) {
            return Err(PipelineError::InvalidConfig(format!(
                "max_empty_page_ratio must be within 0.0–1.0, got {}",
                c.scan.max_empty_page_ratio
            )));
        }
        if c.max_input_chars < 1_000 {
            return Err(PipelineError::InvalidConfig(format!(
                "max_input_chars must be ≥ 1000, got {}",
                c.max_input_chars
            )));
        }
        if c.max_pages == 0 || c.max_document_bytes == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_pages and max_document_bytes must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.ocr.timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_retries > MAX_RETRIES {
            return Err(PipelineError::InvalidConfig(format!(
                "max_retries must be ≤ {}, got {}",
                MAX_RETRIES, c.max_retries
            )));
        }
        if let Some(vocab) = &c.industry_vocabulary {
            if vocab.iter().all(|v| v.trim().is_empty()) {
                return Err(PipelineError::InvalidConfig(
                    "industry_vocabulary must contain at least one value".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Scan detection ───────────────────────────────────────────────────────

/// Thresholds deciding whether a document's text layer is usable.
///
/// A document goes to OCR when **either** holds:
/// * the trimmed text across all pages is shorter than `min_total_chars`
///   (no text layer, or only extraction noise), or
/// * more than `max_empty_page_ratio` of its pages are individually empty.
///
/// One image-only page inside a text PDF stays below the ratio and does not
/// send the whole document to OCR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanThresholds {
    pub min_total_chars: usize,
    pub max_empty_page_ratio: f32,
}

impl Default for ScanThresholds {
    fn default() -> Self {
        Self {
            min_total_chars: 32,
            max_empty_page_ratio: 0.5,
        }
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Which engine recognises rasterised pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackendKind {
    /// The `tesseract` CLI. (default)
    #[default]
    Tesseract,
    /// The configured LLM provider, given page images.
    VisionModel,
    /// Never OCR; scanned documents go to the model with whatever text exists.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    pub backend: OcrBackendKind,
    /// Path to the tesseract binary. Default: "tesseract" (from PATH).
    pub tesseract_path: PathBuf,
    /// Tesseract language pack(s), e.g. "eng" or "eng+nor". Default: "eng".
    pub language: String,
    /// Longest rendered edge in pixels. Default: 2000.
    pub max_rendered_pixels: u32,
    /// Per-page recognition timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackendKind::default(),
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            max_rendered_pixels: 2000,
            timeout_secs: 60,
        }
    }
}

// ── Page separator ───────────────────────────────────────────────────────

/// How pages are separated in the assembled document text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Blank line only: "\n\n".
    BlankLine,
    /// Explicit page-break marker: "--- page N ---". (default)
    #[default]
    Marker,
    /// Form feed, as emitted by pdftotext: "\n\x0c\n".
    FormFeed,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before page `page_num` (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::BlankLine => "\n\n".to_string(),
            PageSeparator::Marker => format!("\n\n--- page {} ---\n\n", page_num),
            PageSeparator::FormFeed => "\n\x0c\n".to_string(),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
