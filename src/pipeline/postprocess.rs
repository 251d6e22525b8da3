//! Deterministic text cleanup on both sides of the pipeline.
//!
//! * [`normalise_page_text`] runs on pdfium output before segmentation.
//!   pdfium reports line ends as `\r\n`, keeps soft hyphens and zero-width
//!   characters, and pads lines with spaces; left alone these would leak into
//!   the sentence text and therefore into the cache keys.
//! * [`clean_response`] runs on raw model output before JSON parsing. Models
//!   wrap JSON in ```` ```json ```` fences or add a sentence of preamble
//!   despite being told not to.
//!
//! Each rule is a pure `&str → String` function and independently tested.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise extracted page text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF) and form feeds to blank lines
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines into one
pub fn normalise_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    collapse_blank_lines(&s).trim().to_string()
}

/// Reduce raw model output to the JSON object it should contain.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (a leading BOM breaks `serde_json`)
/// 2. Strip outer code fences (```` ```json ... ``` ````)
/// 3. Cut to the outermost `{ … }` when text surrounds the object
pub fn clean_response(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = strip_code_fences(&s);
    extract_json_object(&s)
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n\n")
}

// ── Rule: Remove invisible Unicode characters ────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Collapse blank-line runs ───────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule: Strip outer code fences ────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule: Cut to the outermost JSON object ───────────────────────────────────

fn extract_json_object(input: &str) -> String {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => input[start..=end].to_string(),
        _ => input.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(normalise_line_endings("a\u{000C}b"), "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "Fuß\u{00AD}ball\u{200B} und\u{FEFF} Tor";
        assert_eq!(remove_invisible_chars(input), "Fußball und Tor");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hallo   \nwelt  "),
            "  hallo\nwelt"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_normalise_page_text_keeps_paragraph_breaks() {
        let input = "Der Hund läuft.  \r\n\r\n\r\n\r\nEs regnet.\u{200B}\r\n";
        assert_eq!(normalise_page_text(input), "Der Hund läuft.\n\nEs regnet.");
    }

    #[test]
    fn test_normalise_page_text_blank_line_with_spaces() {
        assert_eq!(normalise_page_text("a\n   \nb"), "a\n\nb");
    }

    #[test]
    fn test_strip_json_fences() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fences() {
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_object_from_chatter() {
        let input = "Here is the analysis:\n{\"translation\": \"x\"}\nHope this helps!";
        assert_eq!(extract_json_object(input), "{\"translation\": \"x\"}");
    }

    #[test]
    fn test_clean_response_full() {
        let input = "\u{FEFF}```json\n{\"translation\": \"It is raining.\"}\n```";
        assert_eq!(clean_response(input), "{\"translation\": \"It is raining.\"}");
    }

    #[test]
    fn test_clean_response_without_object_is_unchanged() {
        assert_eq!(clean_response("I cannot help."), "I cannot help.");
    }
}
