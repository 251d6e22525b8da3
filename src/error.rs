//! Error types for the pdf-explain library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExplainError`]: **Fatal**: the run cannot proceed at all (bad input
//!   file, unreadable PDF, provider not configured) or a sentence failed while
//!   the run uses [`crate::config::ErrorPolicy::Abort`]. Returned as
//!   `Err(ExplainError)` from the top-level `explain*` functions.
//!
//! * [`SentenceError`]: **Per sentence**: the model call for one sentence
//!   failed or returned something that does not match the explanation schema.
//!   Under [`crate::config::ErrorPolicy::Skip`] it is stored inside
//!   [`crate::output::ExplainedSentence`] and rendered as a visible note.
//!
//! Cache read failures are deliberately absent: a missing or unparseable
//! cache file is treated as an empty cache and only logged.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-explain library.
#[derive(Debug, Error)]
pub enum ExplainError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("No pages selected (document has {total} pages)")]
    NoPagesSelected { total: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it on the system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A sentence could not be explained and the run aborts on errors.
    ///
    /// Fields are 0-based like [`crate::model::LocatedSentence`]; the message
    /// shows them 1-based, matching the document headings.
    #[error(
        "Sentence at page {}, paragraph {}, sentence {} failed: {source}\n\
Re-run with --on-error skip to continue past failing sentences.",
        .page + 1,
        .paragraph + 1,
        .sentence + 1
    )]
    SentenceFailed {
        page: usize,
        paragraph: usize,
        sentence: usize,
        #[source]
        source: SentenceError,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external renderer (pandoc) failed or is not installed.
    #[error("Rendering '{path}' failed: {detail}")]
    RenderFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure to explain a single sentence.
///
/// Every variant carries the sentence text so a user can retry it manually.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum SentenceError {
    /// Model call failed after all retries (network, quota, auth, …).
    #[error("LLM call failed after {retries} retries for {sentence:?}: {detail}")]
    LlmFailed {
        sentence: String,
        retries: u32,
        detail: String,
    },

    /// Model call exceeded the per-call timeout on every attempt.
    #[error("LLM call timed out after {secs}s for {sentence:?}")]
    Timeout { sentence: String, secs: u64 },

    /// The model answered, but not with a valid sentence explanation.
    #[error("Invalid explanation for {sentence:?}: {detail}")]
    InvalidResponse { sentence: String, detail: String },

    /// The explanation was produced but could not be persisted.
    #[error("Failed to write explanation cache '{path}' for {sentence:?}: {detail}")]
    CacheWriteFailed {
        sentence: String,
        path: PathBuf,
        detail: String,
    },
}

impl SentenceError {
    /// The sentence this error belongs to.
    pub fn sentence(&self) -> &str {
        match self {
            SentenceError::LlmFailed { sentence, .. }
            | SentenceError::Timeout { sentence, .. }
            | SentenceError::InvalidResponse { sentence, .. }
            | SentenceError::CacheWriteFailed { sentence, .. } => sentence,
        }
    }
}
