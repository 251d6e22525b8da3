//! Document assembly: explained sentences → Markdown, HTML or PDF.
//!
//! Markdown is the canonical rendering. HTML is that Markdown run through
//! pulldown-cmark and wrapped in a standalone page with print CSS. PDF is the
//! Markdown handed to `pandoc`.
//!
//! Layout:
//!
//! ```text
//! # <title>
//! ## Page N            once per page, before its first sentence
//! ### Paragraph M      once per paragraph within a page
//! > <sentence>
//! **Translation:** …
//! **Grammar:** …
//! - **word** (part of speech): meaning
//!     1. example
//! ```
//!
//! Rendering is a pure function of its inputs: no timestamps, no I/O, so the
//! same sentences always give byte-identical output.

use crate::config::OutputFormat;
use crate::error::ExplainError;
use crate::model::{SentenceExplanation, WordExplanation};
use crate::output::ExplainedSentence;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// Executable used for PDF output.
pub const PANDOC: &str = "pandoc";

/// Print stylesheet: each page heading starts a new printed page.
const PRINT_CSS: &str = "\
body { font-family: Georgia, 'Times New Roman', serif; max-width: 46em; margin: 2em auto; line-height: 1.5; }
h2 { break-before: page; }
h2:first-of-type { break-before: auto; }
blockquote { font-size: 1.15em; border-left: 4px solid #888; margin-left: 0; padding-left: 1em; }
.unavailable { color: #a00; }
";

/// Rendering knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Examples shown per word; `None` shows all.
    pub max_examples: Option<usize>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_examples: Some(3),
        }
    }
}

/// Render the document text for `format`.
///
/// PDF documents are carried as Markdown until [`write_document`] hands them
/// to pandoc.
pub fn render(
    format: OutputFormat,
    title: &str,
    sentences: &[ExplainedSentence],
    options: &RenderOptions,
) -> String {
    match format {
        OutputFormat::Markdown | OutputFormat::Pdf => render_markdown(title, sentences, options),
        OutputFormat::Html => render_html(title, sentences, options),
    }
}

/// Render the canonical Markdown document.
pub fn render_markdown(
    title: &str,
    sentences: &[ExplainedSentence],
    options: &RenderOptions,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", escape_markdown(title));

    let mut current_page: Option<usize> = None;
    let mut current_paragraph: Option<usize> = None;

    for item in sentences {
        let loc = &item.location;
        if current_page != Some(loc.page_number) {
            current_page = Some(loc.page_number);
            current_paragraph = None;
            let _ = writeln!(out, "## Page {}\n", loc.page_number + 1);
        }
        if current_paragraph != Some(loc.paragraph_number) {
            current_paragraph = Some(loc.paragraph_number);
            let _ = writeln!(out, "### Paragraph {}\n", loc.paragraph_number + 1);
        }

        let _ = writeln!(out, "> {}\n", escape_markdown(&loc.sentence));

        match (&item.explanation, &item.error) {
            (Some(explanation), _) => write_explanation(&mut out, explanation, options),
            (None, Some(error)) => {
                let _ = writeln!(
                    out,
                    "*Explanation unavailable: {}*\n",
                    escape_markdown(&error.to_string())
                );
            }
            (None, None) => {
                let _ = writeln!(out, "*Explanation unavailable.*\n");
            }
        }
    }

    // Exactly one trailing newline.
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

fn write_explanation(out: &mut String, explanation: &SentenceExplanation, options: &RenderOptions) {
    let _ = writeln!(
        out,
        "**Translation:** {}\n",
        escape_markdown(&explanation.translation)
    );
    let _ = writeln!(
        out,
        "**Grammar:** {}\n",
        escape_markdown(&explanation.grammar_explanation)
    );

    if explanation.word_definitions.is_empty() {
        return;
    }
    out.push_str("**Words:**\n\n");
    for word in &explanation.word_definitions {
        write_word(out, word, options);
    }
    out.push('\n');
}

fn write_word(out: &mut String, word: &WordExplanation, options: &RenderOptions) {
    let class = match word.difficulty {
        Some(level) => format!("{}, {}", word.part_of_speech, level),
        None => word.part_of_speech.to_string(),
    };
    let _ = writeln!(
        out,
        "- **{}** ({}): {}",
        escape_markdown(&word.word),
        class,
        escape_markdown(&word.meaning)
    );
    let shown = options.max_examples.unwrap_or(usize::MAX);
    for (i, example) in word.examples.iter().take(shown).enumerate() {
        let _ = writeln!(out, "    {}. {}", i + 1, escape_markdown(example));
    }
}

/// Render a standalone HTML page from the canonical Markdown.
pub fn render_html(title: &str, sentences: &[ExplainedSentence], options: &RenderOptions) -> String {
    markdown_to_html(title, &render_markdown(title, sentences, options))
}

/// Convert Markdown to a standalone HTML page. Raw HTML in the input is
/// shown as text, never passed through.
pub fn markdown_to_html(title: &str, markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });

    let mut body = String::new();
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html lang=\"de\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        PRINT_CSS,
        body
    )
}

/// Write a rendered document to `path`.
///
/// Markdown and HTML are written atomically (temp file + rename). For PDF,
/// `document` must be the canonical Markdown; it is converted by pandoc.
pub async fn write_document(
    path: &Path,
    format: OutputFormat,
    title: &str,
    document: &str,
) -> Result<(), ExplainError> {
    let write_err = |source| ExplainError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    match format {
        OutputFormat::Markdown | OutputFormat::Html => {
            let tmp = path.with_extension(format!("{}.tmp", format.extension()));
            tokio::fs::write(&tmp, document).await.map_err(write_err)?;
            tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
        }
        OutputFormat::Pdf => run_pandoc(path, title, document).await?,
    }

    info!("Wrote {}", path.display());
    Ok(())
}

/// Convert canonical Markdown to PDF with pandoc.
async fn run_pandoc(path: &Path, title: &str, markdown: &str) -> Result<(), ExplainError> {
    let render_err = |detail: String| ExplainError::RenderFailed {
        path: path.to_path_buf(),
        detail,
    };

    let work = tempfile::TempDir::new().map_err(|e| render_err(format!("temp dir: {e}")))?;
    let source = work.path().join("document.md");
    let css = work.path().join("print.css");
    let target = work.path().join("document.pdf");
    tokio::fs::write(&source, markdown)
        .await
        .map_err(|e| render_err(format!("temp file: {e}")))?;
    tokio::fs::write(&css, PRINT_CSS)
        .await
        .map_err(|e| render_err(format!("temp file: {e}")))?;

    debug!("Running {} on {}", PANDOC, source.display());
    let output = tokio::process::Command::new(PANDOC)
        .arg(&source)
        .args(["--from", "markdown", "--to", "html5", "--standalone"])
        .arg("--css")
        .arg(&css)
        .arg("--metadata")
        .arg(format!("pagetitle={title}"))
        .arg("--output")
        .arg(&target)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                render_err(format!("'{PANDOC}' not found on PATH; install pandoc for PDF output"))
            } else {
                render_err(e.to_string())
            }
        })?;

    if !output.status.success() {
        return Err(render_err(format!(
            "{} exited with {}: {}",
            PANDOC,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // rename() cannot cross filesystems; the temp dir may live elsewhere.
    tokio::fs::copy(&target, path)
        .await
        .map_err(|source| ExplainError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

// ── Escaping ─────────────────────────────────────────────────────────────────

static RE_LINE_START_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\s*)(\d+)([.)])").unwrap());

/// Escape text so Markdown shows it literally.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|' | '~'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    let out = RE_LINE_START_LIST.replace_all(&out, "$1$2\\$3");
    out.lines()
        .map(|line| match line.trim_start().chars().next() {
            Some('-') | Some('+') | Some('=') => {
                let indent = line.len() - line.trim_start().len();
                format!("{}\\{}", &line[..indent], &line[indent..])
            }
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
