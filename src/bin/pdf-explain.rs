//! CLI binary for pdf-explain.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExplainConfig`, writes the document and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_explain::config::default_output_path;
use pdf_explain::{
    explain_to_file, inspect, ErrorPolicy, ExplainConfig, ExplainProgressCallback,
    LocatedSentence, OutputFormat, PageSelection, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress: a spinner while the PDF is read, then a bar over the
/// located sentences. Failed sentences are printed above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    cached: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            cached: AtomicUsize::new(0),
        })
    }
}

impl ExplainProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_sentences: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} sentences  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_sentences as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Explaining");
        self.bar.set_message("");
        self.bar.reset_eta();
    }

    fn on_sentence_start(&self, sentence: &LocatedSentence) {
        self.bar.set_message(format!(
            "page {} ¶ {}",
            sentence.page_number + 1,
            sentence.paragraph_number + 1
        ));
    }

    fn on_sentence_complete(&self, _sentence: &LocatedSentence, cached: bool) {
        if cached {
            self.cached.fetch_add(1, Ordering::Relaxed);
        }
        self.bar.inc(1);
    }

    fn on_sentence_error(&self, sentence: &LocatedSentence, error: &str) {
        let msg: String = if error.chars().count() > 100 {
            error.chars().take(99).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} page {} ¶ {} #{}  {}",
            red("✗"),
            sentence.page_number + 1,
            sentence.paragraph_number + 1,
            sentence.sentence_number + 1,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_sentences: usize, failed: usize) {
        self.bar.finish_and_clear();
        let cached = self.cached.load(Ordering::Relaxed);
        if failed == 0 {
            eprintln!(
                "{} {} sentences explained  {}",
                green("✔"),
                bold(&total_sentences.to_string()),
                dim(&format!("({cached} from cache)"))
            );
        } else {
            eprintln!(
                "{} {}/{} sentences explained  ({} failed)",
                cyan("⚠"),
                bold(&(total_sentences - failed).to_string()),
                total_sentences,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # First page of a German PDF → Kafka_explained.md
  pdf-explain Kafka.pdf

  # First three pages, custom title
  pdf-explain Kafka.pdf -n 3 -t "Die Verwandlung"

  # Selected pages to a printable PDF (requires pandoc)
  pdf-explain --pages 2-5 Kafka.pdf -o kafka.pdf

  # HTML, four requests in flight, keep going past bad sentences
  pdf-explain --format html --concurrency 4 --on-error skip Kafka.pdf

  # Inspect PDF metadata (no API key needed)
  pdf-explain --inspect-only Kafka.pdf

CACHE:
  Explanations are stored in data/explanation_cache.json (see --cache),
  keyed by the exact sentence text. Re-running a document only pays for
  sentences it has not seen before. The file is plain JSON and safe to
  share between documents.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  PDF_EXPLAIN_*           Every flag, e.g. PDF_EXPLAIN_CACHE, PDF_EXPLAIN_FORMAT

  A .env file in the working directory is loaded at startup.
"#;

/// Translate and annotate German PDFs sentence by sentence.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-explain",
    version,
    about = "Translate and annotate German PDFs sentence by sentence",
    long_about = "Extract the German text of a PDF, split it into sentences, and produce a \
study document with an English translation, a grammar explanation and word-by-word \
definitions for every sentence. Explanations come from an LLM (OpenAI, Anthropic, Gemini, \
Ollama, …) and are cached on disk.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input_file: String,

    /// Output file. Default: <input stem>_explained.<md|html|pdf> next to the input.
    #[arg(short = 'o', long = "output_file", env = "PDF_EXPLAIN_OUTPUT")]
    output_file: Option<PathBuf>,

    /// Explain the first N pages. Default: 1.
    #[arg(
        short = 'n',
        long = "number_of_pages",
        env = "PDF_EXPLAIN_NUMBER_OF_PAGES",
        conflicts_with = "pages"
    )]
    number_of_pages: Option<usize>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF_EXPLAIN_PAGES")]
    pages: Option<String>,

    /// Document title. Default: the input file stem.
    #[arg(short = 't', long, env = "PDF_EXPLAIN_TITLE")]
    title: Option<String>,

    /// Output format. Default: from the output extension, else markdown.
    #[arg(long, env = "PDF_EXPLAIN_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Explanation cache file.
    #[arg(long, env = "PDF_EXPLAIN_CACHE", default_value = pdf_explain::config::DEFAULT_CACHE_PATH)]
    cache: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "PDF_EXPLAIN_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDF_EXPLAIN_PROVIDER")]
    provider: Option<String>,

    /// Sentences explained at the same time.
    #[arg(short, long, env = "PDF_EXPLAIN_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Retries per sentence on LLM failure (0-10).
    #[arg(
        long,
        env = "PDF_EXPLAIN_MAX_RETRIES",
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(0..=10)
    )]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF_EXPLAIN_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF_EXPLAIN_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per sentence.
    #[arg(long, env = "PDF_EXPLAIN_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Examples shown per word (0 hides them).
    #[arg(long, env = "PDF_EXPLAIN_MAX_EXAMPLES", default_value_t = 3)]
    max_examples: usize,

    /// What to do when a sentence cannot be explained.
    #[arg(long, env = "PDF_EXPLAIN_ON_ERROR", value_enum, default_value = "abort")]
    on_error: OnErrorArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF_EXPLAIN_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF_EXPLAIN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF_EXPLAIN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print PDF metadata only, no explanation.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_EXPLAIN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_EXPLAIN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_EXPLAIN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Markdown,
    Html,
    Pdf,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Pdf => OutputFormat::Pdf,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OnErrorArg {
    Abort,
    Skip,
}

impl From<OnErrorArg> for ErrorPolicy {
    fn from(v: OnErrorArg) -> Self {
        match v {
            OnErrorArg::Abort => ErrorPolicy::Abort,
            OnErrorArg::Skip => ErrorPolicy::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; anything already in the environment wins.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them all back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut builder = ExplainConfig::builder().download_timeout_secs(cli.download_timeout);
        if let Some(ref password) = cli.password {
            builder = builder.password(password);
        }
        let config = builder.build().context("Invalid configuration")?;

        let meta = inspect(&cli.input_file, &config)
            .await
            .context("Failed to inspect PDF")?;

        println!("File:         {}", cli.input_file);
        if let Some(ref t) = meta.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = meta.author {
            println!("Author:       {}", a);
        }
        if let Some(ref s) = meta.subject {
            println!("Subject:      {}", s);
        }
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        if let Some(ref p) = meta.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = meta.creator {
            println!("Creator:      {}", c);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let format = resolve_format(&cli);
    let output_path = cli
        .output_file
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input_file, format));

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExplainProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, format, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let stats = explain_to_file(&cli.input_file, &output_path, &config)
        .await
        .context("Explanation failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} sentences  {} cached  {} LLM calls  {}ms  →  {}",
            if stats.failed_sentences == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.total_sentences,
            stats.cache_hits,
            stats.llm_calls,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if stats.skipped_pages > 0 {
            eprintln!(
                "   {} page(s) had no readable text",
                red(&stats.skipped_pages.to_string())
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// `--format`, else the output extension, else Markdown.
fn resolve_format(cli: &Cli) -> OutputFormat {
    cli.format
        .map(OutputFormat::from)
        .or_else(|| cli.output_file.as_deref().and_then(OutputFormat::from_path))
        .unwrap_or_default()
}

/// Map CLI args to `ExplainConfig`.
async fn build_config(
    cli: &Cli,
    format: OutputFormat,
    progress: Option<ProgressCallback>,
) -> Result<ExplainConfig> {
    let pages = match (&cli.pages, cli.number_of_pages) {
        (Some(spec), _) => parse_pages(spec)?,
        (None, Some(n)) => PageSelection::First(n),
        (None, None) => PageSelection::default(),
    };

    let mut builder = ExplainConfig::builder()
        .cache_path(&cli.cache)
        .concurrency(cli.concurrency)
        .pages(pages)
        .format(format)
        .on_error(cli.on_error.into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .max_examples(Some(cli.max_examples))
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref title) = cli.title {
        builder = builder.title(title);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    let page_number = |p: &str| -> Result<usize> {
        let n: usize = p
            .trim()
            .parse()
            .with_context(|| format!("Invalid page number: '{}'", p.trim()))?;
        if n < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", n);
        }
        Ok(n)
    };

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let (start, end) = (page_number(start)?, page_number(end)?);
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages = s.split(',').map(page_number).collect::<Result<Vec<_>>>()?;
        return Ok(PageSelection::Set(pages));
    }

    Ok(PageSelection::Single(page_number(&s)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_pages_forms() {
        assert_eq!(parse_pages("all").unwrap(), PageSelection::All);
        assert_eq!(parse_pages(" 5 ").unwrap(), PageSelection::Single(5));
        assert_eq!(parse_pages("3-15").unwrap(), PageSelection::Range(3, 15));
        assert_eq!(
            parse_pages("1,3,5").unwrap(),
            PageSelection::Set(vec![1, 3, 5])
        );
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("5-3").is_err());
        assert!(parse_pages("x").is_err());
    }

    #[test]
    fn number_of_pages_maps_to_first() {
        let cli = Cli::parse_from(["pdf-explain", "doc.pdf", "-n", "3"]);
        assert_eq!(cli.number_of_pages, Some(3));
        assert!(cli.pages.is_none());
    }

    #[test]
    fn number_of_pages_conflicts_with_pages() {
        let res = Cli::try_parse_from(["pdf-explain", "doc.pdf", "-n", "3", "--pages", "1-2"]);
        assert!(res.is_err());
    }

    #[test]
    fn format_follows_output_extension() {
        let cli = Cli::parse_from(["pdf-explain", "doc.pdf", "-o", "out/doc.pdf"]);
        assert_eq!(resolve_format(&cli), OutputFormat::Pdf);

        let cli = Cli::parse_from(["pdf-explain", "doc.pdf", "-o", "out.html", "--format", "markdown"]);
        assert_eq!(resolve_format(&cli), OutputFormat::Markdown);

        let cli = Cli::parse_from(["pdf-explain", "doc.pdf"]);
        assert_eq!(resolve_format(&cli), OutputFormat::Markdown);
    }
}
