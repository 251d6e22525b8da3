//! End-to-end tests for pdf-explain.
//!
//! These tests read real PDF files from `./test_cases/` through pdfium and
//! make live LLM API calls. They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! The PDF under test is `test_cases/german_sample.pdf` (any German text PDF
//! with at least two pages of running text).

use pdf_explain::{
    explain, explain_to_file, inspect, ErrorPolicy, ExplainConfig, OutputFormat, PageSelection,
};
use std::path::PathBuf;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn sample_pdf() -> PathBuf {
    test_cases_dir().join("german_sample.pdf")
}

fn live_config(cache: &TempDir) -> ExplainConfig {
    ExplainConfig::builder()
        .cache_path(cache.path().join("cache.json"))
        .on_error(ErrorPolicy::Skip)
        .build()
        .unwrap()
}

// ── Inspect tests (no LLM) ───────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_sample() {
    let path = e2e_skip_unless_ready!(sample_pdf());

    let meta = inspect(path.to_str().unwrap(), &ExplainConfig::default())
        .await
        .expect("inspect() should succeed");

    assert!(meta.page_count >= 1);
    assert!(!meta.pdf_version.is_empty());
    println!("Metadata: {:?}", meta);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let result = inspect("/definitely/not/a/real/file.pdf", &ExplainConfig::default()).await;
    assert!(result.is_err(), "inspect() should fail for a missing file");
}

// ── Live explanation tests (need LLM API) ────────────────────────────────────

#[tokio::test]
async fn test_explain_first_page() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    let cache = TempDir::new().unwrap();

    let out = explain(path.to_str().unwrap(), &live_config(&cache))
        .await
        .expect("explain() should succeed");

    assert!(out.stats.total_sentences > 0, "no sentences found on page 1");
    assert_eq!(out.stats.selected_pages, 1);
    assert!(out.document.contains("## Page 1"));
    assert!(out.document.contains("**Translation:**"));
    assert!(out.sentences.iter().all(|s| s.location.page_number == 0));
    println!("{}", out.document);
}

#[tokio::test]
async fn test_second_run_uses_cache_only() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    let cache = TempDir::new().unwrap();
    let config = live_config(&cache);

    let first = explain(path.to_str().unwrap(), &config).await.unwrap();
    let second = explain(path.to_str().unwrap(), &config).await.unwrap();

    // Failed sentences are not cached and are asked again.
    assert_eq!(second.stats.llm_calls > 0, first.stats.failed_sentences > 0);
    if first.stats.failed_sentences == 0 {
        assert_eq!(first.document, second.document);
    }
}

#[tokio::test]
async fn test_explain_to_html_file() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    let cache = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    let out_path = out_dir.path().join("sample_explained.html");

    let mut config = live_config(&cache);
    config.format = OutputFormat::Html;
    config.pages = PageSelection::First(2);

    let stats = explain_to_file(path.to_str().unwrap(), &out_path, &config)
        .await
        .expect("explain_to_file() should succeed");

    let html = std::fs::read_to_string(&out_path).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(stats.selected_pages <= 2);
    println!("{stats:?}");
}
