//! # pdf-explain
//!
//! Turn a German PDF into a study document: every sentence with its English
//! translation, an explanation of its grammar, and a definition of each word.
//!
//! Explanations come from a language model and are remembered in a JSON
//! cache keyed by the exact sentence text, so re-running a document (or a
//! later document that repeats a sentence) costs nothing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   page text via pdfium (spawn_blocking)
//!  ├─ 3. Segment   paragraphs → sentences, each with its location
//!  ├─ 4. Explain   cache lookup, model call on a miss, cache store
//!  └─ 5. Assemble  Markdown (canonical), HTML, or PDF via pandoc
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_explain::{explain_to_file, ExplainConfig, PageSelection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExplainConfig::builder()
//!         .pages(PageSelection::First(2))
//!         .build()?;
//!     let stats = explain_to_file("kafka.pdf", "kafka_explained.md", &config).await?;
//!     eprintln!("{} sentences, {} from cache", stats.total_sentences, stats.cache_hits);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-explain` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-explain = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod explain;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ErrorPolicy, ExplainConfig, ExplainConfigBuilder, OutputFormat, PageSelection,
};
pub use error::{ExplainError, SentenceError};
pub use explain::{
    explain, explain_pages, explain_sync, explain_to_file, inspect, resolve_language_model,
};
pub use model::{
    CefrLevel, LocatedSentence, PartOfSpeech, SentenceExplanation, WordExplanation,
};
pub use output::{DocumentMetadata, ExplainOutput, ExplainStats, ExplainedSentence};
pub use pipeline::cache::ExplanationCache;
pub use pipeline::extract::PageText;
pub use pipeline::llm::{LanguageModel, ModelReply, ProviderModel, RequestOptions};
pub use pipeline::segment::{GermanSentenceSplitter, Segmenter, SentenceSplitter};
pub use progress::{ExplainProgressCallback, NoopProgressCallback, ProgressCallback};
