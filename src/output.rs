//! Result types returned by the parsing entry points.

use crate::error::{FieldWarning, PageError};
use crate::schema::ResumeRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text of one page, from either the text layer or OCR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 0-indexed page position in the document.
    pub index: usize,
    /// Extracted text; empty when the page has no glyphs or OCR failed.
    pub text: String,
}

impl PageText {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Non-whitespace character count.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Where the document text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// The PDF's embedded text layer.
    TextLayer,
    /// Rasterised pages run through OCR.
    Ocr,
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextSource::TextLayer => f.write_str("text layer"),
            TextSource::Ocr => f.write_str("ocr"),
        }
    }
}

/// Per-document statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseStats {
    pub total_pages: usize,
    /// `None` only when the pipeline was fed text directly.
    pub text_source: Option<TextSource>,
    /// Pages whose OCR failed and contributed empty text.
    pub failed_pages: Vec<PageError>,
    /// Characters of assembled text before truncation.
    pub assembled_chars: usize,
    /// Whether the assembled text was cut to `max_input_chars`.
    pub truncated: bool,
    /// Whether the model output needed the repair pass.
    pub repaired: bool,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Retries the model call needed.
    pub retries: u32,
    pub text_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A validated record plus everything learned while producing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutput {
    pub record: ResumeRecord,
    /// Fields the validator nulled or corrected.
    pub warnings: Vec<FieldWarning>,
    pub stats: ParseStats,
}

impl ParseOutput {
    pub fn into_record(self) -> ResumeRecord {
        self.record
    }
}
