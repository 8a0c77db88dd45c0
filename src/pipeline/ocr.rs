//! OCR for scanned documents: rasterise, recognise page by page, collect.
//!
//! Two seams:
//!
//! * [`PageRecognizer`] turns one page image into text. Implemented by
//!   [`TesseractRecognizer`] (the `tesseract` CLI) and [`VisionRecognizer`]
//!   (the configured LLM provider, given the page PNG).
//! * [`OcrEngine`] turns a whole PDF buffer into per-page text. The default
//!   [`RasterOcr`] renders with pdfium and drives a recognizer.
//!
//! A page that cannot be rendered, recognised or that exceeds the timeout
//! contributes `""` plus a [`PageError`]. Only a backend that cannot run at
//! all fails the document, as [`PipelineError::OcrUnavailable`].

use crate::config::{OcrBackendKind, OcrSettings, ParseConfig};
use crate::error::{PageError, PipelineError};
use crate::output::PageText;
use crate::pipeline::llm::classify_llm_error;
use crate::pipeline::render::{render_pages, RenderedPage};
use crate::progress::ProgressCallback;
use crate::prompts::OCR_SYSTEM_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use image::DynamicImage;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Failure of one recognition call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizeError {
    /// The backend cannot run at all; the document fails.
    Unavailable(String),
    /// This page could not be recognised; the document carries on.
    Page(String),
}

/// Recognises text in one rasterised page.
#[async_trait]
pub trait PageRecognizer: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Cheap probe run once per document before any page is recognised.
    async fn check_available(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// `page_num` is 1-indexed.
    async fn recognize(&self, page_num: usize, image: &DynamicImage)
        -> Result<String, RecognizeError>;
}

/// Per-page text produced by OCR, plus the pages that failed.
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    pub pages: Vec<PageText>,
    pub failures: Vec<PageError>,
}

/// Produces per-page text for a scanned PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize_document(
        &self,
        bytes: Arc<[u8]>,
        document: &str,
        config: &ParseConfig,
    ) -> Result<OcrOutcome, PipelineError>;
}

/// pdfium rasterisation followed by a [`PageRecognizer`].
pub struct RasterOcr {
    recognizer: Arc<dyn PageRecognizer>,
}

impl RasterOcr {
    pub fn new(recognizer: Arc<dyn PageRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Build the engine selected by `settings.backend`.
    ///
    /// `provider` is required for [`OcrBackendKind::VisionModel`]. Returns
    /// `Ok(None)` when OCR is disabled.
    pub fn from_settings(
        settings: &OcrSettings,
        provider: Option<Arc<dyn LLMProvider>>,
    ) -> Result<Option<Self>, PipelineError> {
        let recognizer: Arc<dyn PageRecognizer> = match settings.backend {
            OcrBackendKind::Disabled => return Ok(None),
            OcrBackendKind::Tesseract => Arc::new(TesseractRecognizer::new(
                settings.tesseract_path.clone(),
                settings.language.clone(),
            )),
            OcrBackendKind::VisionModel => {
                let provider = provider.ok_or_else(|| PipelineError::OcrUnavailable {
                    backend: "vision".into(),
                    detail: "no LLM provider configured for vision OCR".into(),
                })?;
                Arc::new(VisionRecognizer::new(provider))
            }
        };
        Ok(Some(Self::new(recognizer)))
    }
}

#[async_trait]
impl OcrEngine for RasterOcr {
    async fn recognize_document(
        &self,
        bytes: Arc<[u8]>,
        document: &str,
        config: &ParseConfig,
    ) -> Result<OcrOutcome, PipelineError> {
        self.recognizer.check_available().await?;

        let rendered = render_pages(
            bytes,
            config.password.clone(),
            config.ocr.max_rendered_pixels,
            document.to_string(),
        )
        .await?;

        recognize_rendered(
            self.recognizer.as_ref(),
            rendered,
            Duration::from_secs(config.ocr.timeout_secs),
            document,
            config.progress_callback.as_ref(),
        )
        .await
    }
}

/// Recognise already-rendered pages in order.
///
/// Pages are processed sequentially so the output order is the page order.
pub async fn recognize_rendered(
    recognizer: &dyn PageRecognizer,
    rendered: Vec<RenderedPage>,
    timeout: Duration,
    document: &str,
    progress: Option<&ProgressCallback>,
) -> Result<OcrOutcome, PipelineError> {
    let total = rendered.len();
    let mut outcome = OcrOutcome {
        pages: Vec::with_capacity(total),
        failures: Vec::new(),
    };

    for (idx, image) in rendered {
        let page_num = idx + 1;
        let result = match image {
            Err(e) => Err(e),
            Ok(img) => {
                match tokio::time::timeout(timeout, recognizer.recognize(page_num, &img)).await {
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(RecognizeError::Unavailable(detail))) => {
                        return Err(PipelineError::OcrUnavailable {
                            backend: recognizer.name().to_string(),
                            detail,
                        })
                    }
                    Ok(Err(RecognizeError::Page(detail))) => {
                        Err(PageError::RecognitionFailed {
                            page: page_num,
                            detail,
                        })
                    }
                    Err(_) => Err(PageError::Timeout {
                        page: page_num,
                        secs: timeout.as_secs(),
                    }),
                }
            }
        };

        match result {
            Ok(text) => {
                let page = PageText::new(idx, text);
                debug!("{}: OCR page {}/{} → {} chars", document, page_num, total, page.char_count());
                if let Some(cb) = progress {
                    cb.on_ocr_page(document, page_num, total, page.char_count());
                }
                outcome.pages.push(page);
            }
            Err(e) => {
                warn!("{}: {}", document, e);
                if let Some(cb) = progress {
                    cb.on_ocr_page_error(document, page_num, total, e.to_string());
                }
                outcome.pages.push(PageText::new(idx, ""));
                outcome.failures.push(e);
            }
        }
    }

    info!(
        "{}: OCR finished, {}/{} pages recognised",
        document,
        total - outcome.failures.len(),
        total
    );
    Ok(outcome)
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Runs `tesseract <page.png> stdout -l <lang>` for each page.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl PageRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn check_available(&self) -> Result<(), PipelineError> {
        let probe = tokio::process::Command::new(&self.binary)
            .arg("--version")
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(Duration::from_secs(10), probe).await {
            Ok(Ok(out)) if out.status.success() => Ok(()),
            Ok(Ok(out)) => Err(PipelineError::OcrUnavailable {
                backend: self.name().into(),
                detail: format!(
                    "'{} --version' exited with {}",
                    self.binary.display(),
                    out.status
                ),
            }),
            Ok(Err(e)) => Err(PipelineError::OcrUnavailable {
                backend: self.name().into(),
                detail: format!(
                    "cannot run '{}' (is tesseract installed?): {}",
                    self.binary.display(),
                    e
                ),
            }),
            Err(_) => Err(PipelineError::OcrUnavailable {
                backend: self.name().into(),
                detail: "version probe timed out".into(),
            }),
        }
    }

    async fn recognize(
        &self,
        page_num: usize,
        image: &DynamicImage,
    ) -> Result<String, RecognizeError> {
        let file = tempfile::Builder::new()
            .prefix("resume-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| RecognizeError::Page(format!("temp file: {}", e)))?;
        image
            .save_with_format(file.path(), image::ImageFormat::Png)
            .map_err(|e| RecognizeError::Page(format!("PNG encode: {}", e)))?;

        let output = tokio::process::Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    RecognizeError::Unavailable(format!(
                        "cannot run '{}': {}",
                        self.binary.display(),
                        e
                    ))
                }
                _ => RecognizeError::Page(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            // A missing language pack fails every page the same way.
            if stderr.contains("Failed loading language") || stderr.contains("Error opening data file") {
                return Err(RecognizeError::Unavailable(stderr.trim().to_string()));
            }
            return Err(RecognizeError::Page(format!(
                "tesseract exited with {} on page {}: {}",
                output.status,
                page_num,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

// ── Vision model ─────────────────────────────────────────────────────────

/// Transcribes page images with a vision-capable LLM provider.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

/// PNG-encode a page and wrap it as base64 `ImageData`.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[async_trait]
impl PageRecognizer for VisionRecognizer {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(
        &self,
        page_num: usize,
        image: &DynamicImage,
    ) -> Result<String, RecognizeError> {
        let image_data =
            encode_page(image).map_err(|e| RecognizeError::Page(format!("PNG encode: {}", e)))?;

        let messages = vec![
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(4096),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => Ok(response.content),
            Err(e) => {
                let msg = e.to_string();
                debug!("Vision OCR page {} failed: {}", page_num, msg);
                // Bad credentials or an unknown model fail every page alike.
                if classify_llm_error(&e).is_permanent() {
                    Err(RecognizeError::Unavailable(msg))
                } else {
                    Err(RecognizeError::Page(msg))
                }
            }
        }
    }
}
