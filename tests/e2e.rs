//! End-to-end integration tests for edgequake-resume.
//!
//! These tests use real resume PDFs in `./test_cases/` and make live LLM API
//! calls (and run tesseract for the scanned sample). They are gated behind
//! the `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 DYLD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture
//!
//! Expected files:
//!   test_cases/resume_text.pdf     a text-bearing resume
//!   test_cases/resume_scanned.pdf  the same kind of resume, image-only

use edgequake_resume::{
    parse_resume_file, parse_resume_to_file, ParseConfig, PipelineError, ResumeParser, Stage,
    TextSource,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn e2e_config() -> ParseConfig {
    ParseConfig::builder()
        .model(std::env::var("EDGEQUAKE_MODEL").unwrap_or_else(|_| "gpt-4.1-nano".into()))
        .build()
        .expect("default config is valid")
}

// ── Text layer (no LLM, instant) ─────────────────────────────────────────────

#[tokio::test]
async fn test_text_resume_reads_text_layer() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume_text.pdf"));

    let parser = ResumeParser::new(e2e_config()).expect("provider configured");
    let bytes = std::fs::read(&path).unwrap();
    let doc = parser.read_text(&bytes, "resume_text.pdf").await.unwrap();

    assert_eq!(doc.source, TextSource::TextLayer);
    assert!(!doc.scan.needs_ocr);
    assert!(doc.text.chars().count() > 200, "text layer suspiciously short");
    println!("{} pages, {} chars", doc.pages.len(), doc.scan.total_chars);
}

#[tokio::test]
async fn test_scanned_resume_needs_ocr() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume_scanned.pdf"));

    let parser = ResumeParser::new(e2e_config()).expect("provider configured");
    let bytes = std::fs::read(&path).unwrap();
    let doc = parser.read_text(&bytes, "resume_scanned.pdf").await.unwrap();

    assert!(doc.scan.needs_ocr);
    assert_eq!(doc.source, TextSource::Ocr);
    assert!(
        doc.text.chars().count() > 100,
        "OCR produced almost nothing: {:?}",
        doc.text
    );
}

#[tokio::test]
async fn test_missing_file() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let err = parse_resume_file("/definitely/not/here.pdf", &e2e_config())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::FileNotFound { .. }));
    assert_eq!(err.stage(), Stage::Input);
}

// ── Full parse (live LLM) ────────────────────────────────────────────────────

#[tokio::test]
async fn test_parse_text_resume() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume_text.pdf"));

    let out = parse_resume_file(path.to_str().unwrap(), &e2e_config())
        .await
        .expect("parse should succeed");

    assert!(out.record.is_identifiable());
    assert_eq!(out.stats.text_source, Some(TextSource::TextLayer));
    for exp in &out.record.experience {
        assert!(!exp.position.trim().is_empty());
        if exp.ongoing {
            assert_eq!(exp.to, None);
        }
        if let (Some(from), Some(to)) = (exp.from, exp.to) {
            assert!(from <= to, "{} > {}", from, to);
        }
    }
    println!("{}", serde_json::to_string_pretty(&out).unwrap());
}

#[tokio::test]
async fn test_parse_scanned_resume() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume_scanned.pdf"));

    let out = parse_resume_file(path.to_str().unwrap(), &e2e_config())
        .await
        .expect("parse should succeed");

    assert!(out.record.is_identifiable());
    assert_eq!(out.stats.text_source, Some(TextSource::Ocr));
}

#[tokio::test]
async fn test_parse_to_file_writes_json() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume_text.pdf"));
    let out_path = output_dir().join("resume_text.json");

    let stats = parse_resume_to_file(path.to_str().unwrap(), &out_path, &e2e_config())
        .await
        .expect("parse should succeed");

    let written = std::fs::read_to_string(&out_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    for key in ["full_name", "email", "phone", "experience", "languages"] {
        assert!(json.get(key).is_some(), "missing key {key}");
    }
    println!("{:?}", stats);
}
