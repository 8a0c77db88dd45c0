//! Pipeline stages for resume parsing.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the seams (`PageTextSource`, `OcrEngine`, `CompletionModel`) can
//! be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ scan ──┬──────────────▶ assemble ──▶ llm ──▶ validate
//! (bytes)  (pdfium) (branch) └─▶ render ─▶ ocr ─┘        (model)  (repair + dates)
//! ```
//!
//! 1. [`input`]    — load a path or URL into memory, check the `%PDF` magic
//! 2. [`text`]     — read the embedded text layer page by page
//! 3. [`scan`]     — decide whether that text layer is usable
//! 4. [`render`]   — rasterise pages for OCR; runs in `spawn_blocking`
//! 5. [`ocr`]      — recognise each page image; one bad page never sinks the document
//! 6. [`assemble`] — clean and join pages in order with explicit separators
//! 7. [`llm`]      — the extraction call with timeout and retry/backoff
//! 8. [`repair`], [`dates`], [`validate`] — turn the untrusted answer into a record

pub mod assemble;
pub mod dates;
pub mod input;
pub mod llm;
pub mod ocr;
pub(crate) mod pdf;
pub mod render;
pub mod repair;
pub mod scan;
pub mod text;
pub mod validate;
