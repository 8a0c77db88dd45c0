//! # edgequake-resume
//!
//! Turn resume PDFs into structured, validated JSON records.
//!
//! Text-bearing PDFs are read from their embedded text layer; scanned ones
//! are detected and sent through OCR. The assembled text goes to an LLM
//! with a strict schema contract, and the answer is treated as untrusted
//! input: repaired where the shape is recoverable, normalised (dates,
//! language levels, placeholders) and rejected with every offending field
//! path when it is not.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Text     embedded text layer per page (pdfium, spawn_blocking)
//!  ├─ 2. Scan     too little text / too many empty pages? → OCR
//!  ├─ 3. OCR      rasterise + tesseract or a vision model, page by page
//!  ├─ 4. Assemble pages joined in order with "--- page N ---" markers
//!  ├─ 5. Extract  one model call, timeout + retry with backoff
//!  └─ 6. Validate strict parse → repair/coerce → normalise → ResumeRecord
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_resume::{parse_resume_file, ParseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ParseConfig::default();
//!     let output = parse_resume_file("cv.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.record)?);
//!     for w in &output.warnings {
//!         eprintln!("repaired {}", w);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-resume = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime dependencies
//!
//! * a pdfium shared library (`PDFIUM_LIB_PATH`, the working directory or
//!   the system library path)
//! * `tesseract` on `PATH` for the default OCR backend, or
//!   [`OcrBackendKind::VisionModel`] to OCR with the configured provider

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    OcrBackendKind, OcrSettings, PageSeparator, ParseConfig, ParseConfigBuilder, ScanThresholds,
};
pub use error::{FieldViolation, FieldWarning, PageError, PipelineError, Stage, UnavailableReason};
pub use output::{PageText, ParseOutput, ParseStats, TextSource};
pub use parse::{
    parse_resume, parse_resume_file, parse_resume_sync, parse_resume_to_file, write_json,
    DocumentReader, DocumentText, ResumeParser,
};
pub use pipeline::llm::{CompletionModel, ModelError, ModelOptions, ModelReply};
pub use pipeline::ocr::{OcrEngine, OcrOutcome, PageRecognizer};
pub use pipeline::text::PageTextSource;
pub use progress::{NoopProgressCallback, ParseProgressCallback, ProgressCallback};
pub use schema::{
    Certificate, Education, Experience, Language, LanguageLevel, Reference, ResumeRecord,
};
