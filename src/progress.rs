//! Progress-callback trait for per-document pipeline events.
//!
//! Inject an [`Arc<dyn ParseProgressCallback>`] via
//! [`crate::config::ParseConfigBuilder::progress_callback`] to follow each
//! document through text extraction, OCR, the model call and validation.
//!
//! The trait is `Send + Sync`: batch runs drive many documents at once and
//! every event may arrive from a different task. Every event carries the
//! document label so one callback can serve a whole batch.
//!
//! # Example
//!
//! ```rust
//! use edgequake_resume::{ParseConfig, ParseProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Done(AtomicUsize);
//!
//! impl ParseProgressCallback for Done {
//!     fn on_document_complete(&self, _document: &str, _warnings: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ParseConfig::builder()
//!     .progress_callback(Arc::new(Done(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::TextSource;
use std::sync::Arc;

/// Called by the pipeline as a document moves through its stages.
///
/// All methods have no-op defaults so implementations override only what
/// they need.
pub trait ParseProgressCallback: Send + Sync {
    /// The text layer was read; `total_pages` is the document's page count.
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let _ = (document, total_pages);
    }

    /// The scan detector picked the text source for this document.
    fn on_text_source(&self, document: &str, source: TextSource) {
        let _ = (document, source);
    }

    /// One page was recognised by OCR.
    fn on_ocr_page(&self, document: &str, page_num: usize, total_pages: usize, chars: usize) {
        let _ = (document, page_num, total_pages, chars);
    }

    /// One page failed OCR and contributes empty text.
    fn on_ocr_page_error(&self, document: &str, page_num: usize, total_pages: usize, error: String) {
        let _ = (document, page_num, total_pages, error);
    }

    /// The assembled text is about to be sent to the model.
    fn on_extraction_start(&self, document: &str, input_chars: usize) {
        let _ = (document, input_chars);
    }

    /// A validated record was produced.
    fn on_document_complete(&self, document: &str, warnings: usize) {
        let _ = (document, warnings);
    }

    /// The document failed with a fatal error.
    fn on_document_error(&self, document: &str, error: String) {
        let _ = (document, error);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ParseProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ParseConfig`].
pub type ProgressCallback = Arc<dyn ParseProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tracking {
        ocr_pages: AtomicUsize,
        ocr_errors: AtomicUsize,
        sources: Mutex<Vec<TextSource>>,
        completed: AtomicUsize,
    }

    impl ParseProgressCallback for Tracking {
        fn on_text_source(&self, _document: &str, source: TextSource) {
            self.sources.lock().unwrap().push(source);
        }

        fn on_ocr_page(&self, _document: &str, _page: usize, _total: usize, _chars: usize) {
            self.ocr_pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_ocr_page_error(&self, _document: &str, _page: usize, _total: usize, _e: String) {
            self.ocr_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _document: &str, _warnings: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_start("cv.pdf", 2);
        cb.on_text_source("cv.pdf", TextSource::Ocr);
        cb.on_ocr_page("cv.pdf", 1, 2, 120);
        cb.on_ocr_page_error("cv.pdf", 2, 2, "boom".into());
        cb.on_extraction_start("cv.pdf", 120);
        cb.on_document_complete("cv.pdf", 0);
        cb.on_document_error("cv.pdf", "x".into());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_text_source("a.pdf", TextSource::TextLayer);
        t.on_text_source("b.pdf", TextSource::Ocr);
        t.on_ocr_page("b.pdf", 1, 2, 10);
        t.on_ocr_page_error("b.pdf", 2, 2, "corrupt image".into());
        t.on_document_complete("a.pdf", 0);
        t.on_document_complete("b.pdf", 1);

        assert_eq!(
            *t.sources.lock().unwrap(),
            vec![TextSource::TextLayer, TextSource::Ocr]
        );
        assert_eq!(t.ocr_pages.load(Ordering::SeqCst), 1);
        assert_eq!(t.ocr_errors.load(Ordering::SeqCst), 1);
        assert_eq!(t.completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn arc_dyn_callback_moves_into_spawn() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        tokio::spawn(async move {
            cb.on_ocr_page_error("c.pdf", 1, 1, "timeout".to_string());
        })
        .await
        .expect("spawn must succeed");
    }
}
