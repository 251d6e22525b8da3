//! Explanation entry points.
//!
//! [`explain`] runs the whole pipeline on a PDF path or URL.
//! [`explain_pages`] starts from already-extracted page text, which is how
//! tests and callers with their own extractor drive it.

use crate::config::{default_title, ErrorPolicy, ExplainConfig, DEFAULT_MODEL};
use crate::error::ExplainError;
use crate::model::LocatedSentence;
use crate::output::{DocumentMetadata, ExplainOutput, ExplainStats, ExplainedSentence};
use crate::pipeline::assemble::{self, RenderOptions};
use crate::pipeline::cache::ExplanationCache;
use crate::pipeline::extract::{self, PageText};
use crate::pipeline::llm::{self, LanguageModel, ProviderModel, RequestOutcome};
use crate::pipeline::{input, segment::Segmenter};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Explain a PDF file or URL.
///
/// # Errors
/// Returns `Err(ExplainError)` for fatal errors: unreadable input, no pages
/// selected, no provider configured, or, under [`ErrorPolicy::Abort`], the
/// first sentence that could not be explained.
///
/// # Example
/// ```rust,no_run
/// use pdf_explain::{explain, ExplainConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = explain("kafka.pdf", &ExplainConfig::default()).await?;
/// println!("{}", output.document);
/// # Ok(())
/// # }
/// ```
pub async fn explain(
    input_str: impl AsRef<str>,
    config: &ExplainConfig,
) -> Result<ExplainOutput, ExplainError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting explanation run: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Resolve the language model ───────────────────────────────
    let model = resolve_language_model(config)?;

    // ── Step 3: Extract page text ────────────────────────────────────────
    let extract_start = Instant::now();
    let extraction =
        extract::extract_text(resolved.path(), config.password.as_deref(), &config.pages).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} of {} selected pages in {}ms",
        extraction.pages.len(),
        extraction.selected_pages,
        extract_duration_ms
    );

    // ── Step 4: Explain and render ───────────────────────────────────────
    let title = config
        .title
        .clone()
        .unwrap_or_else(|| default_title(input_str));
    let mut output = run(model, &extraction.pages, title, extraction.metadata, config).await?;

    output.stats.selected_pages = extraction.selected_pages;
    output.stats.skipped_pages = extraction.skipped_pages;
    output.stats.extract_duration_ms = extract_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Run complete: {} sentences, {} cache hits, {} model calls, {}ms total",
        output.stats.total_sentences,
        output.stats.cache_hits,
        output.stats.llm_calls,
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Explain pages whose text is already known.
///
/// Page selection, password and input settings of `config` are ignored;
/// everything else applies.
pub async fn explain_pages(
    pages: &[PageText],
    title: &str,
    config: &ExplainConfig,
) -> Result<ExplainOutput, ExplainError> {
    let start = Instant::now();
    let model = resolve_language_model(config)?;
    let metadata = DocumentMetadata {
        page_count: pages.len(),
        ..Default::default()
    };
    let mut output = run(model, pages, title.to_string(), metadata, config).await?;
    output.stats.selected_pages = pages.len();
    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Explain a PDF and write the rendered document to `output_path`.
///
/// Markdown and HTML are written atomically; PDF is produced by pandoc.
pub async fn explain_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExplainConfig,
) -> Result<ExplainStats, ExplainError> {
    let output = explain(input_str, config).await?;
    assemble::write_document(
        output_path.as_ref(),
        config.format,
        &output.title,
        &output.document,
    )
    .await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`explain`].
///
/// Creates a temporary tokio runtime internally.
pub fn explain_sync(
    input_str: impl AsRef<str>,
    config: &ExplainConfig,
) -> Result<ExplainOutput, ExplainError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExplainError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(explain(input_str, config))
}

/// Read PDF metadata without explaining anything.
///
/// Needs no language model or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExplainConfig,
) -> Result<DocumentMetadata, ExplainError> {
    let resolved =
        input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    extract::extract_metadata(resolved.path(), config.password.as_deref()).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Segment, explain and render.
async fn run(
    model: Arc<dyn LanguageModel>,
    pages: &[PageText],
    title: String,
    metadata: DocumentMetadata,
    config: &ExplainConfig,
) -> Result<ExplainOutput, ExplainError> {
    let sentences = Segmenter::default().segment_pages(pages);
    debug!("Segmented {} pages into {} sentences", pages.len(), sentences.len());

    let cache = ExplanationCache::new(&config.cache_path);
    let llm_start = Instant::now();
    let (explained, mut stats) = explain_sentences(model.as_ref(), &cache, sentences, config).await?;
    stats.llm_duration_ms = llm_start.elapsed().as_millis() as u64;
    stats.total_pages = metadata.page_count;

    let options = RenderOptions {
        max_examples: config.max_examples,
    };
    let document = assemble::render(config.format, &title, &explained, &options);

    Ok(ExplainOutput {
        document,
        title,
        sentences: explained,
        metadata,
        stats,
    })
}

/// Explain every sentence in document order, applying the error policy.
///
/// With `concurrency > 1` requests overlap, but results are consumed in
/// order, so an abort always reports the first failing sentence.
async fn explain_sentences(
    model: &dyn LanguageModel,
    cache: &ExplanationCache,
    sentences: Vec<LocatedSentence>,
    config: &ExplainConfig,
) -> Result<(Vec<ExplainedSentence>, ExplainStats), ExplainError> {
    let total = sentences.len();
    let callback = config.progress_callback.as_ref();
    if let Some(cb) = callback {
        cb.on_run_start(total);
    }

    let mut stats = ExplainStats {
        total_sentences: total,
        ..Default::default()
    };
    let mut explained = Vec::with_capacity(total);

    let mut results = stream::iter(sentences.into_iter().map(|location| async move {
        if let Some(cb) = callback {
            cb.on_sentence_start(&location);
        }
        let outcome = llm::request_explanation(model, cache, &location.sentence, config).await;
        (location, outcome)
    }))
    .buffered(config.concurrency.max(1));

    while let Some((location, outcome)) = results.next().await {
        let RequestOutcome {
            result,
            cached,
            llm_calls,
            input_tokens,
            output_tokens,
            ..
        } = outcome;

        stats.llm_calls += llm_calls;
        stats.total_input_tokens += input_tokens;
        stats.total_output_tokens += output_tokens;

        match result {
            Ok(explanation) => {
                if cached {
                    stats.cache_hits += 1;
                }
                if let Some(cb) = callback {
                    cb.on_sentence_complete(&location, cached);
                }
                explained.push(ExplainedSentence {
                    location,
                    explanation: Some(explanation),
                    error: None,
                    cached,
                });
            }
            Err(error) => {
                if let Some(cb) = callback {
                    cb.on_sentence_error(&location, &error.to_string());
                }
                match config.on_error {
                    ErrorPolicy::Abort => {
                        return Err(ExplainError::SentenceFailed {
                            page: location.page_number,
                            paragraph: location.paragraph_number,
                            sentence: location.sentence_number,
                            source: error,
                        });
                    }
                    ErrorPolicy::Skip => {
                        warn!(
                            "Skipping page {} paragraph {} sentence {}: {}",
                            location.page_number + 1,
                            location.paragraph_number + 1,
                            location.sentence_number + 1,
                            error
                        );
                        stats.failed_sentences += 1;
                        explained.push(ExplainedSentence {
                            location,
                            explanation: None,
                            error: Some(error),
                            cached: false,
                        });
                    }
                }
            }
        }
    }

    if let Some(cb) = callback {
        cb.on_run_complete(total, stats.failed_sentences);
    }
    Ok((explained, stats))
}

/// Resolve the language model, from most-specific to least-specific.
///
/// 1. **Injected model** (`config.language_model`): used as-is.
/// 2. **Pre-built provider** (`config.provider`): wrapped in a
///    [`ProviderModel`].
/// 3. **Named provider + model** (`config.provider_name`): created through
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **OpenAI key** (`OPENAI_API_KEY`): OpenAI with the configured model.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_language_model(
    config: &ExplainConfig,
) -> Result<Arc<dyn LanguageModel>, ExplainError> {
    if let Some(ref model) = config.language_model {
        return Ok(Arc::clone(model));
    }
    Ok(Arc::new(ProviderModel::new(resolve_provider(config)?)))
}

fn resolve_provider(config: &ExplainConfig) -> Result<Arc<dyn LLMProvider>, ExplainError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExplainError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExplainError> {
    debug!("Creating provider {} with model {}", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExplainError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
