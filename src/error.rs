//! Error types for the edgequake-resume library.
//!
//! Three tiers of failure, from most to least severe:
//!
//! * [`PipelineError`] — **Fatal** for one document: the record cannot be
//!   produced (malformed PDF, OCR engine missing, model unreachable, model
//!   output unrecoverable). Returned as `Err(PipelineError)` from the
//!   top-level `parse_*` functions. Nothing partial leaks with it.
//!
//! * [`PageError`] — **Non-fatal**: one page could not be rasterised or
//!   recognised. The page contributes empty text and the document carries on.
//!
//! * [`FieldWarning`] — **Non-fatal**: one field of the model's answer was
//!   repaired (unparseable date nulled, `to` cleared on an ongoing entry, …).
//!   Stored in [`crate::output::ParseOutput::warnings`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Input,
    TextLayer,
    Ocr,
    Extraction,
    Validation,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Input => "input",
            Stage::TextLayer => "text_layer",
            Stage::Ocr => "ocr",
            Stage::Extraction => "extraction",
            Stage::Validation => "validation",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

/// Why the extraction model could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// HTTP 429 or a provider quota message.
    RateLimited { retry_after_secs: Option<u64> },
    /// The call exceeded `api_timeout_secs`.
    Timeout { secs: u64 },
    /// 401/403 or an invalid key. Retrying will not help.
    Authentication,
    /// Connection refused, DNS, TLS, reset.
    Network,
    /// The provider refused the request itself: unknown model, invalid
    /// parameters, context too long. Retrying will not help.
    Rejected,
    /// Any other provider-side failure (5xx, overloaded, bad gateway).
    Provider,
}

impl UnavailableReason {
    /// Failures that the same request will hit again.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            UnavailableReason::Authentication | UnavailableReason::Rejected
        )
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::RateLimited {
                retry_after_secs: Some(s),
            } => write!(f, "rate limited (retry after {s}s)"),
            UnavailableReason::RateLimited {
                retry_after_secs: None,
            } => f.write_str("rate limited"),
            UnavailableReason::Timeout { secs } => write!(f, "timed out after {secs}s"),
            UnavailableReason::Authentication => f.write_str("authentication failed"),
            UnavailableReason::Network => f.write_str("network error"),
            UnavailableReason::Rejected => f.write_str("request rejected"),
            UnavailableReason::Provider => f.write_str("provider error"),
        }
    }
}

/// One offending field in a [`PipelineError::SchemaViolation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// JSON path of the field, e.g. `languages[1].level` or `$` for the root.
    pub path: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn render_violations(fields: &[FieldViolation]) -> String {
    fields
        .iter()
        .map(|v| format!("{} ({})", v.path, v.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// All fatal errors returned by the edgequake-resume library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Resume file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The byte buffer is not a PDF, or its structure cannot be parsed.
    #[error("Document '{document}' is not a readable PDF: {detail}")]
    MalformedDocument { document: String, detail: String },

    /// PDF requires a password but none (or the wrong one) was provided.
    #[error("Document '{document}' is encrypted; supply the correct password")]
    PasswordRequired { document: String },

    /// The document exceeds the configured byte or page cap.
    #[error("Document '{document}' is too large: {actual} {unit} (limit {limit})")]
    DocumentTooLarge {
        document: String,
        actual: usize,
        limit: usize,
        unit: &'static str,
    },

    // ── Dependency errors ─────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfEngineUnavailable(String),

    /// The OCR backend cannot be invoked at all (binary missing, model unset).
    #[error("OCR backend '{backend}' is unavailable: {detail}")]
    OcrUnavailable { backend: String, detail: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The extraction model call failed after all retries.
    #[error("Extraction model unavailable ({reason}): {detail}")]
    ExtractionUnavailable {
        reason: UnavailableReason,
        detail: String,
    },

    // ── Data errors ───────────────────────────────────────────────────────
    /// Model output could not be turned into a valid record, even after repair.
    #[error(
        "Model output violates the resume schema in {} field(s): {}",
        .fields.len(),
        render_violations(.fields)
    )]
    SchemaViolation { fields: Vec<FieldViolation> },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::FileNotFound { .. }
            | PipelineError::PermissionDenied { .. }
            | PipelineError::InvalidInput { .. }
            | PipelineError::DownloadFailed { .. }
            | PipelineError::DownloadTimeout { .. }
            | PipelineError::DocumentTooLarge { .. } => Stage::Input,
            PipelineError::MalformedDocument { .. }
            | PipelineError::PasswordRequired { .. }
            | PipelineError::PdfEngineUnavailable(_) => Stage::TextLayer,
            PipelineError::OcrUnavailable { .. } => Stage::Ocr,
            PipelineError::ProviderNotConfigured { .. }
            | PipelineError::ExtractionUnavailable { .. } => Stage::Extraction,
            PipelineError::SchemaViolation { .. } => Stage::Validation,
            PipelineError::OutputWriteFailed { .. } => Stage::Output,
            PipelineError::InvalidConfig(_) => Stage::Config,
            PipelineError::Internal(_) => Stage::Output,
        }
    }

    /// Whether the caller may retry the same document with backoff.
    ///
    /// Dependency failures are transient; authentication failures, input
    /// errors and schema violations are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::ExtractionUnavailable { reason, .. } => !reason.is_permanent(),
            PipelineError::OcrUnavailable { .. }
            | PipelineError::DownloadFailed { .. }
            | PipelineError::DownloadTimeout { .. } => true,
            _ => false,
        }
    }

    /// Offending field paths of a [`PipelineError::SchemaViolation`], empty otherwise.
    pub fn field_paths(&self) -> Vec<&str> {
        match self {
            PipelineError::SchemaViolation { fields } => {
                fields.iter().map(|v| v.path.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A non-fatal error for a single page.
///
/// The page contributes empty text to the assembled document; the rest of
/// the document is processed normally.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The OCR backend ran but could not recognise the page.
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    /// Recognition of this page exceeded the OCR timeout.
    #[error("Page {page}: OCR timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// 1-indexed page number.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::RecognitionFailed { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }
}

/// A field the validator had to repair or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWarning {
    pub path: String,
    pub message: String,
}

impl FieldWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
