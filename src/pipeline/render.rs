//! PDF rasterisation for OCR: render every page to a `DynamicImage`.
//!
//! pdfium keeps thread-local state and is CPU-bound, so rendering runs on
//! the blocking pool. The longest edge is capped by `max_rendered_pixels`
//! rather than a DPI, which bounds memory whatever the physical page size.
//!
//! Failing to open the document is fatal; failing to render one page is
//! not, and is reported per page.

use crate::error::{PageError, PipelineError};
use crate::pipeline::pdf::{bind_pdfium, open_document};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// `(page_index_0based, image or page failure)`, in page order.
pub type RenderedPage = (usize, Result<DynamicImage, PageError>);

/// Rasterise all pages of an in-memory PDF.
pub async fn render_pages(
    bytes: Arc<[u8]>,
    password: Option<String>,
    max_pixels: u32,
    document: String,
) -> Result<Vec<RenderedPage>, PipelineError> {
    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&bytes, password.as_deref(), max_pixels, &document)
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    bytes: &[u8],
    password: Option<&str>,
    max_pixels: u32,
    document: &str,
) -> Result<Vec<RenderedPage>, PipelineError> {
    let pdfium = bind_pdfium()?;
    let doc = open_document(&pdfium, bytes, password, document)?;

    let pages = doc.pages();
    let total_pages = pages.len() as usize;
    info!("{}: rendering {} pages for OCR", document, total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let rendered = pages
            .get(idx as u16)
            .map_err(|e| format!("{:?}", e))
            .and_then(|page| {
                // The bitmap borrows the page, so convert before it drops.
                page.render_with_config(&render_config)
                    .map(|bitmap| bitmap.as_image())
                    .map_err(|e| format!("{:?}", e))
            })
            .map_err(|detail| PageError::RenderFailed {
                page: idx + 1,
                detail,
            });

        if let Ok(image) = &rendered {
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
        }
        results.push((idx, rendered));
    }

    Ok(results)
}
