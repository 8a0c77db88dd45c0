//! Text-layer extraction: the PDF's embedded text, one entry per page.
//!
//! Never fails on a structurally valid PDF. Pages whose text cannot be read
//! (or that carry no glyphs) contribute `""`; only an unparseable buffer is
//! an error.

use crate::error::PipelineError;
use crate::output::PageText;
use crate::pipeline::pdf::{bind_pdfium, open_document};
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of per-page text for a PDF buffer.
///
/// Implementations are blocking; [`extract_pages`] moves them off the async
/// executor.
pub trait PageTextSource: Send + Sync {
    fn extract_pages(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        document: &str,
    ) -> Result<Vec<PageText>, PipelineError>;
}

/// Text layer read through pdfium.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumTextLayer;

impl PageTextSource for PdfiumTextLayer {
    fn extract_pages(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        document: &str,
    ) -> Result<Vec<PageText>, PipelineError> {
        let pdfium = bind_pdfium()?;
        let doc = open_document(&pdfium, bytes, password, document)?;

        let pages = doc.pages();
        let mut out = Vec::with_capacity(pages.len() as usize);

        for (index, page) in pages.iter().enumerate() {
            let text = match page.text() {
                Ok(t) => t.all(),
                Err(e) => {
                    warn!("{}: page {} has no readable text layer: {:?}", document, index + 1, e);
                    String::new()
                }
            };
            debug!("{}: page {} → {} chars", document, index + 1, text.len());
            out.push(PageText::new(index, text));
        }

        Ok(out)
    }
}

/// Run a [`PageTextSource`] on the blocking pool.
pub async fn extract_pages(
    source: Arc<dyn PageTextSource>,
    bytes: Arc<[u8]>,
    password: Option<String>,
    document: String,
) -> Result<Vec<PageText>, PipelineError> {
    tokio::task::spawn_blocking(move || {
        source.extract_pages(&bytes, password.as_deref(), &document)
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Text extraction task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    impl PageTextSource for Fixed {
        fn extract_pages(
            &self,
            _bytes: &[u8],
            _password: Option<&str>,
            _document: &str,
        ) -> Result<Vec<PageText>, PipelineError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, t)| PageText::new(i, *t))
                .collect())
        }
    }

    #[tokio::test]
    async fn runs_source_on_blocking_pool() {
        let source: Arc<dyn PageTextSource> = Arc::new(Fixed(vec!["one", "", "three"]));
        let pages = extract_pages(source, Arc::from(&b"%PDF"[..]), None, "t.pdf".into())
            .await
            .unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1], PageText::new(1, ""));
        assert_eq!(pages[2].index, 2);
    }
}
