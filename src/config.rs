//! Configuration types for a sentence-explanation run.
//!
//! All run behaviour is controlled through [`ExplainConfig`], built via its
//! [`ExplainConfigBuilder`]. Setters clamp obviously out-of-range values;
//! `build()` rejects the combinations that cannot work.

use crate::error::ExplainError;
use crate::pipeline::llm::LanguageModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default location of the explanation cache, relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = "data/explanation_cache.json";

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Upper bound for [`ExplainConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for one explanation run.
///
/// # Example
/// ```rust
/// use pdf_explain::{ExplainConfig, OutputFormat, PageSelection};
///
/// let config = ExplainConfig::builder()
///     .pages(PageSelection::Range(1, 3))
///     .format(OutputFormat::Html)
///     .cache_path("data/german_cache.json")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExplainConfig {
    /// Path of the JSON explanation cache. Default: [`DEFAULT_CACHE_PATH`].
    pub cache_path: PathBuf,

    /// Number of sentences explained at the same time. Default: 1.
    ///
    /// Results keep document order whatever the value; cache writes are
    /// serialised by the cache itself.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed language model. Takes precedence over `provider`.
    pub language_model: Option<Arc<dyn LanguageModel>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum output tokens per sentence. Default: 4096.
    ///
    /// A long sentence with twenty words, each with examples, easily needs
    /// 2 000 tokens; truncated JSON fails validation.
    pub max_tokens: usize,

    /// Retries for a failed model call (network, quota, timeout). Default: 2.
    ///
    /// Responses that arrive but do not match the schema are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// What a failed sentence does to the run. Default: [`ErrorPolicy::Abort`].
    pub on_error: ErrorPolicy,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: first page only.
    pub pages: PageSelection,

    /// Rendered document format. Default: Markdown.
    pub format: OutputFormat,

    /// Document title. If None, the input file stem is used.
    pub title: Option<String>,

    /// Examples rendered per word. `None` renders all. Default: 3.
    pub max_examples: Option<usize>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-sentence progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            concurrency: 1,
            model: None,
            provider_name: None,
            provider: None,
            language_model: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            system_prompt: None,
            on_error: ErrorPolicy::default(),
            password: None,
            pages: PageSelection::default(),
            format: OutputFormat::default(),
            title: None,
            max_examples: Some(3),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExplainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplainConfig")
            .field("cache_path", &self.cache_path)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "language_model",
                &self.language_model.as_ref().map(|_| "<dyn LanguageModel>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("on_error", &self.on_error)
            .field("pages", &self.pages)
            .field("format", &self.format)
            .field("title", &self.title)
            .field("max_examples", &self.max_examples)
            .finish()
    }
}

impl ExplainConfig {
    /// Create a new builder for `ExplainConfig`.
    pub fn builder() -> ExplainConfigBuilder {
        ExplainConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExplainConfig`].
pub struct ExplainConfigBuilder {
    config: ExplainConfig,
}

impl ExplainConfigBuilder {
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = path.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.config.language_model = Some(model);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.config.on_error = policy;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn max_examples(mut self, n: Option<usize>) -> Self {
        self.config.max_examples = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExplainConfig, ExplainError> {
        let c = &self.config;
        if c.cache_path.as_os_str().is_empty() {
            return Err(ExplainError::InvalidConfig(
                "Cache path must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExplainError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExplainError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || start > end {
                return Err(ExplainError::InvalidConfig(format!(
                    "Invalid page range {start}-{end}: pages are 1-indexed and start must be <= end"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What happens when a sentence cannot be explained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Stop the run on the first failed sentence. (default)
    #[default]
    Abort,
    /// Record the failure, render a note in its place, and continue.
    Skip,
}

/// Format of the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Canonical Markdown. (default)
    #[default]
    Markdown,
    /// Self-contained HTML page with print styles (one printed page per PDF page).
    Html,
    /// PDF produced by pandoc from the Markdown.
    Pdf,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// Infer the format from a file extension, if it is one we write.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(OutputFormat::Markdown),
            "html" | "htm" => Some(OutputFormat::Html),
            "pdf" => Some(OutputFormat::Pdf),
            _ => None,
        }
    }
}

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages.
    All,
    /// The first N pages, clamped to the page count. (default: 1)
    First(usize),
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl Default for PageSelection {
    fn default() -> Self {
        PageSelection::First(1)
    }
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::First(n) => (0..(*n).min(total_pages)).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Default output path: `<input_stem>_explained.<ext>` next to the input.
///
/// URL inputs resolve to the working directory, named after the last path
/// segment of the URL.
pub fn default_output_path(input: &str, format: OutputFormat) -> PathBuf {
    let (dir, stem) = input_location(input);
    dir.join(format!("{stem}_explained.{}", format.extension()))
}

/// Default document title: the input file stem.
pub fn default_title(input: &str) -> String {
    input_location(input).1
}

fn input_location(input: &str) -> (PathBuf, String) {
    if crate::pipeline::input::is_url(input) {
        let name = input
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("document");
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document");
        return (PathBuf::new(), stem.to_string());
    }
    let path = Path::new(input);
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    (dir, stem)
}
