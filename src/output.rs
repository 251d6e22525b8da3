//! Result types returned by the `explain*` entry points.

use crate::error::SentenceError;
use crate::model::{LocatedSentence, SentenceExplanation};
use serde::{Deserialize, Serialize};

/// A located sentence together with what became of it.
///
/// Exactly one of `explanation` / `error` is set. `error` only appears when
/// the run uses [`crate::config::ErrorPolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainedSentence {
    pub location: LocatedSentence,
    pub explanation: Option<SentenceExplanation>,
    pub error: Option<SentenceError>,
    /// Served from the explanation cache without a model call.
    pub cached: bool,
}

/// Complete result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainOutput {
    /// Rendered document (Markdown or HTML, see `config.format`).
    pub document: String,
    /// Document title used for rendering.
    pub title: String,
    /// Every located sentence in document order.
    pub sentences: Vec<ExplainedSentence>,
    pub metadata: DocumentMetadata,
    pub stats: ExplainStats,
}

/// Run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages selected for processing.
    pub selected_pages: usize,
    /// Selected pages whose text could not be extracted.
    pub skipped_pages: usize,
    /// Located sentences produced by the segmenter.
    pub total_sentences: usize,
    /// Sentences answered from the cache.
    pub cache_hits: usize,
    /// Language-model calls issued, retries included.
    pub llm_calls: usize,
    /// Sentences without an explanation (skip policy only).
    pub failed_sentences: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// PDF document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}
