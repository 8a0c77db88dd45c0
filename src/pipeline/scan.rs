//! Scanned-document detection.
//!
//! Decides from the text layer alone whether OCR is needed. The rule is a
//! disjunction of two thresholds from [`ScanThresholds`]: too little text
//! overall, or too large a share of individually empty pages.

use crate::config::ScanThresholds;
use crate::output::PageText;
use serde::{Deserialize, Serialize};

/// Which threshold triggered OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanReason {
    TooLittleText,
    TooManyEmptyPages,
}

/// Outcome of inspecting the text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Non-whitespace characters across all pages.
    pub total_chars: usize,
    pub pages: usize,
    pub empty_pages: usize,
    pub empty_ratio: f32,
    pub needs_ocr: bool,
    pub reason: Option<ScanReason>,
}

/// Inspect per-page text and decide whether the document needs OCR.
///
/// A document with zero pages has an empty ratio of 0 and falls through to
/// the character threshold.
pub fn detect(pages: &[PageText], thresholds: &ScanThresholds) -> ScanReport {
    let total_chars: usize = pages.iter().map(PageText::char_count).sum();
    let empty_pages = pages.iter().filter(|p| p.is_blank()).count();
    let empty_ratio = if pages.is_empty() {
        0.0
    } else {
        empty_pages as f32 / pages.len() as f32
    };

    let reason = if total_chars < thresholds.min_total_chars {
        Some(ScanReason::TooLittleText)
    } else if empty_ratio > thresholds.max_empty_page_ratio {
        Some(ScanReason::TooManyEmptyPages)
    } else {
        None
    };

    ScanReport {
        total_chars,
        pages: pages.len(),
        empty_pages,
        empty_ratio,
        needs_ocr: reason.is_some(),
        reason,
    }
}

/// Shorthand for `detect(..).needs_ocr`.
pub fn needs_ocr(pages: &[PageText], thresholds: &ScanThresholds) -> bool {
    detect(pages, thresholds).needs_ocr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<PageText> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| PageText::new(i, *t))
            .collect()
    }

    const BODY: &str = "Jane Doe, Senior Engineer at Acme Corp since 2019, Oslo, Norway";

    #[test]
    fn text_pdf_needs_no_ocr() {
        let r = detect(&pages(&[BODY, BODY]), &ScanThresholds::default());
        assert!(!r.needs_ocr);
        assert_eq!(r.reason, None);
        assert_eq!(r.empty_pages, 0);
    }

    #[test]
    fn empty_text_layer_needs_ocr() {
        let r = detect(&pages(&["", " ", "\n"]), &ScanThresholds::default());
        assert!(r.needs_ocr);
        assert_eq!(r.reason, Some(ScanReason::TooLittleText));
        assert_eq!(r.empty_ratio, 1.0);
    }

    #[test]
    fn single_image_page_stays_below_ratio() {
        let r = detect(&pages(&[BODY, "", BODY]), &ScanThresholds::default());
        assert!(!r.needs_ocr);
        assert_eq!(r.empty_pages, 1);
    }

    #[test]
    fn mostly_empty_pages_need_ocr() {
        let r = detect(&pages(&[BODY, "", "", ""]), &ScanThresholds::default());
        assert!(r.needs_ocr);
        assert_eq!(r.reason, Some(ScanReason::TooManyEmptyPages));
    }

    #[test]
    fn ratio_at_threshold_is_not_exceeded() {
        let r = detect(&pages(&[BODY, ""]), &ScanThresholds::default());
        assert_eq!(r.empty_ratio, 0.5);
        assert!(!r.needs_ocr);
    }

    #[test]
    fn zero_pages_use_char_threshold() {
        let r = detect(&[], &ScanThresholds::default());
        assert_eq!(r.empty_ratio, 0.0);
        assert!(r.needs_ocr);
        assert!(!needs_ocr(
            &[],
            &ScanThresholds {
                min_total_chars: 0,
                max_empty_page_ratio: 0.5
            }
        ));
    }
}
