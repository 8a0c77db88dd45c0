//! pdfium binding and document loading shared by the text and render stages.

use crate::error::PipelineError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH` (a library file or the directory
/// holding it), then the working directory, then the system library path.
pub(crate) fn bind_pdfium() -> Result<Pdfium, PipelineError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| PipelineError::PdfEngineUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open a PDF held in memory, mapping pdfium failures onto input errors.
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    password: Option<&str>,
    document: &str,
) -> Result<PdfDocument<'a>, PipelineError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                PipelineError::PasswordRequired {
                    document: document.to_string(),
                }
            } else {
                PipelineError::MalformedDocument {
                    document: document.to_string(),
                    detail: err_str,
                }
            }
        })
}
