//! Input resolution: load a user-supplied path or URL into memory.
//!
//! The pipeline itself consumes a byte buffer, so both local files and
//! downloads end up as `Vec<u8>` with a label for diagnostics. The `%PDF`
//! magic and the byte cap are checked here, before pdfium sees anything.

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A document loaded into memory.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// File name (or URL tail) used in logs, errors and output names.
    pub label: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Verify the buffer starts with the PDF magic bytes.
pub fn check_pdf_magic(bytes: &[u8], document: &str) -> Result<(), PipelineError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(PipelineError::MalformedDocument {
            document: document.to_string(),
            detail: format!("missing %PDF header (first bytes: {:?})", magic),
        });
    }
    Ok(())
}

/// Verify the buffer does not exceed `max_bytes`.
pub fn check_size(bytes: &[u8], max_bytes: usize, document: &str) -> Result<(), PipelineError> {
    if bytes.len() > max_bytes {
        return Err(PipelineError::DocumentTooLarge {
            document: document.to_string(),
            actual: bytes.len(),
            limit: max_bytes,
            unit: "bytes",
        });
    }
    Ok(())
}

/// Load a local file or download a URL.
pub async fn load_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<LoadedDocument, PipelineError> {
    let doc = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        load_local(Path::new(input)).await?
    };
    check_size(&doc.bytes, max_bytes, &doc.label)?;
    check_pdf_magic(&doc.bytes, &doc.label)?;
    Ok(doc)
}

async fn load_local(path: &Path) -> Result<LoadedDocument, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PipelineError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    debug!("Loaded local document: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedDocument {
        label: label_for_path(path),
        bytes,
    })
}

fn label_for_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, PipelineError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(LoadedDocument {
        label: extract_filename(url),
        bytes: bytes.to_vec(),
    })
}

/// Extract a reasonable file name from the URL path.
pub fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// Expand directories into the `.pdf` files they contain (sorted, non-recursive).
/// URLs and plain files pass through unchanged.
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<String>, PipelineError> {
    let mut out = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if !is_url(input) && path.is_dir() {
            let entries = std::fs::read_dir(&path).map_err(|_| PipelineError::FileNotFound {
                path: path.clone(),
            })?;
            let mut pdfs: Vec<String> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                            .unwrap_or(false)
                })
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            pdfs.sort();
            out.extend(pdfs);
        } else {
            out.push(input.clone());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/cv.pdf"));
        assert!(is_url("http://example.com/cv.pdf"));
        assert!(!is_url("/tmp/cv.pdf"));
        assert!(!is_url("cv.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_check() {
        assert!(check_pdf_magic(b"%PDF-1.7\n...", "a.pdf").is_ok());
        let err = check_pdf_magic(b"PK\x03\x04", "a.docx").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument { .. }));
        assert!(check_pdf_magic(b"%P", "short").is_err());
    }

    #[test]
    fn size_check() {
        assert!(check_size(&[0u8; 10], 10, "a").is_ok());
        let err = check_size(&[0u8; 11], 10, "a").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DocumentTooLarge { actual: 11, limit: 10, .. }
        ));
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(extract_filename("https://x.org/cvs/jane.pdf"), "jane.pdf");
        assert_eq!(extract_filename("https://x.org/download"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_input("/definitely/not/here.pdf", 5, 1024).await.unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_non_pdf_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"hello world").unwrap();
        let err = load_input(path.to_str().unwrap(), 5, 1024).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument { .. }));
    }

    #[test]
    fn directories_expand_to_sorted_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();

        let expanded =
            expand_inputs(&[dir.path().to_string_lossy().to_string(), "https://x/y.pdf".into()])
                .unwrap();
        assert_eq!(expanded.len(), 3);
        assert!(expanded[0].ends_with("a.PDF"));
        assert!(expanded[1].ends_with("b.pdf"));
        assert_eq!(expanded[2], "https://x/y.pdf");
    }
}
