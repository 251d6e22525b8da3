//! Segmentation: page text → paragraphs → located sentences.
//!
//! Paragraphs are separated by blank lines. Inside a paragraph, single line
//! breaks are layout wraps from the PDF and are joined back into running
//! text before sentence splitting, so no sentence ever crosses a paragraph
//! boundary and no sentence is cut at a line end.
//!
//! Sentence-boundary detection sits behind [`SentenceSplitter`]. The default
//! [`GermanSentenceSplitter`] is rule based: it knows the common German
//! abbreviations and does not break after ordinals (`am 3. Mai`,
//! `im 19. Jahrhundert`), where a capitalised noun would otherwise look like
//! the start of a new sentence.
//!
//! Segmentation is deterministic: the same page text always produces the same
//! sentences with the same numbering, which keeps cache keys stable across
//! runs.

use crate::model::LocatedSentence;
use crate::pipeline::extract::PageText;
use crate::pipeline::postprocess::normalise_page_text;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Splits one paragraph of running text into sentences.
pub trait SentenceSplitter: Send + Sync {
    /// Return the sentences of `text` in order, trimmed, without empty entries.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Abbreviations after which a period never ends a sentence (lowercase, no final dot).
const GERMAN_ABBREVIATIONS: &[&str] = &[
    "abb", "abs", "abschn", "anm", "bd", "bspw", "bzgl", "bzw", "ca", "d.h", "dr", "ebd",
    "evtl", "f", "ff", "fr", "ggf", "hr", "hrsg", "i.a", "inkl", "jh", "jhd", "kap", "max",
    "min", "mio", "mrd", "nr", "o.ä", "prof", "s", "sog", "st", "str", "tel", "u.ä",
    "u.u", "usf", "v.a", "vgl", "z.b", "z.t", "zb", "zit", "zzgl",
];

/// Rule-based sentence splitter for German prose.
pub struct GermanSentenceSplitter {
    abbreviations: HashSet<String>,
}

impl Default for GermanSentenceSplitter {
    fn default() -> Self {
        Self {
            abbreviations: GERMAN_ABBREVIATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GermanSentenceSplitter {
    /// Add abbreviations (case-insensitive, with or without the final dot).
    pub fn with_abbreviations<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.abbreviations.extend(
            extra
                .into_iter()
                .map(|s| s.as_ref().trim_end_matches('.').to_lowercase()),
        );
        self
    }

    /// Whether a period directly after `prefix` belongs to the last word
    /// rather than ending the sentence.
    fn period_is_part_of_word(&self, prefix: &str) -> bool {
        let word = prefix
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(is_opener);
        if word.is_empty() {
            return false;
        }
        if self.abbreviations.contains(&word.to_lowercase()) {
            return true;
        }
        let mut chars = word.chars();
        let single_initial = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase());
        // Ordinals: "3." is "third". Four-digit years still end a sentence.
        single_initial || (word.len() <= 3 && word.chars().all(|c| c.is_ascii_digit()))
    }
}

impl SentenceSplitter for GermanSentenceSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut sentences = Vec::new();
        let mut start = 0usize;
        let mut i = 0usize;

        while i < chars.len() {
            let (term_pos, c) = chars[i];
            if !is_terminator(c) {
                i += 1;
                continue;
            }

            // Absorb "?!", "...", and closing quotes/brackets.
            let mut j = i + 1;
            while j < chars.len() && (is_terminator(chars[j].1) || is_closer(chars[j].1)) {
                j += 1;
            }
            if j >= chars.len() || !chars[j].1.is_whitespace() {
                i = j;
                continue;
            }

            let mut k = j;
            while k < chars.len() && chars[k].1.is_whitespace() {
                k += 1;
            }
            if k >= chars.len() {
                break;
            }

            let next = chars[k].1;
            let starts_sentence = next.is_uppercase() || next.is_ascii_digit() || is_opener(next);
            if !starts_sentence || (c == '.' && self.period_is_part_of_word(&text[start..term_pos]))
            {
                i = k;
                continue;
            }

            push_sentence(&mut sentences, &text[start..chars[j].0]);
            start = chars[k].0;
            i = k;
        }

        push_sentence(&mut sentences, &text[start..]);
        sentences
    }
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let s = raw.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’' | '«' | '»' | ')' | ']')
}

fn is_opener(c: char) -> bool {
    matches!(c, '"' | '„' | '‚' | '“' | '»' | '«' | '(' | '[')
}

// ── Paragraphs ───────────────────────────────────────────────────────────────

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]{2,}").unwrap());

/// Split page text into paragraphs of running text.
///
/// Line wraps are joined with a space; a word hyphenated across a line end
/// (`Fuß-` / `ball`) is rejoined without the hyphen, unless the next line
/// opens with a conjunction (`Nord-` / `und Südamerika`). Blank paragraphs
/// are dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    RE_PARAGRAPH_BREAK
        .split(text)
        .map(unwrap_lines)
        .filter(|p| !p.is_empty())
        .collect()
}

fn unwrap_lines(paragraph: &str) -> String {
    let mut out = String::with_capacity(paragraph.len());
    for line in paragraph.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if out.is_empty() {
            out.push_str(line);
            continue;
        }
        let next_is_lower = line.chars().next().is_some_and(char::is_lowercase);
        let hyphenated = out.ends_with('-')
            && out[..out.len() - 1]
                .chars()
                .last()
                .is_some_and(char::is_alphabetic);
        if hyphenated && next_is_lower && !starts_with_conjunction(line) {
            out.pop();
        } else {
            out.push(' ');
        }
        out.push_str(line);
    }
    RE_SPACES.replace_all(&out, " ").into_owned()
}

/// Words that follow a suspended compound (`Nord- und Südamerika`).
const CONJUNCTIONS: &[&str] = &["und", "oder", "bis", "bzw", "sowie", "als", "noch"];

fn starts_with_conjunction(line: &str) -> bool {
    let first = line
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches(|c: char| !c.is_alphabetic());
    CONJUNCTIONS.contains(&first)
}

// ── Segmenter ────────────────────────────────────────────────────────────────

/// Turns page text into [`LocatedSentence`]s.
pub struct Segmenter {
    splitter: Box<dyn SentenceSplitter>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(Box::new(GermanSentenceSplitter::default()))
    }
}

impl Segmenter {
    pub fn new(splitter: Box<dyn SentenceSplitter>) -> Self {
        Self { splitter }
    }

    /// Segment one page. `page_number` is the 0-based page index.
    ///
    /// Paragraphs that yield no sentence do not consume a paragraph number.
    pub fn segment_page(&self, page_number: usize, text: &str) -> Vec<LocatedSentence> {
        let text = normalise_page_text(text);
        let mut located = Vec::new();
        let mut paragraph_number = 0usize;

        for paragraph in split_paragraphs(&text) {
            let sentences = self.splitter.split(&paragraph);
            if sentences.is_empty() {
                continue;
            }
            located.extend(sentences.into_iter().enumerate().map(|(sentence_number, sentence)| {
                LocatedSentence {
                    page_number,
                    paragraph_number,
                    sentence_number,
                    sentence,
                }
            }));
            paragraph_number += 1;
        }

        debug!(
            "Page {}: {} paragraphs, {} sentences",
            page_number + 1,
            paragraph_number,
            located.len()
        );
        located
    }

    /// Segment pages in the given order.
    pub fn segment_pages(&self, pages: &[PageText]) -> Vec<LocatedSentence> {
        pages
            .iter()
            .flat_map(|p| self.segment_page(p.page_index, &p.text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        GermanSentenceSplitter::default().split(text)
    }

    fn positions(located: &[LocatedSentence]) -> Vec<(usize, usize, usize)> {
        located.iter().map(LocatedSentence::position).collect()
    }

    #[test]
    fn example_page_yields_three_located_sentences() {
        let seg = Segmenter::default();
        let located =
            seg.segment_page(0, "Der Hund läuft schnell. Die Katze schläft.\n\nEs regnet.");
        assert_eq!(positions(&located), vec![(0, 0, 0), (0, 0, 1), (0, 1, 0)]);
        let texts: Vec<&str> = located.iter().map(|l| l.sentence.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Der Hund läuft schnell.", "Die Katze schläft.", "Es regnet."]
        );
    }

    #[test]
    fn question_and_exclamation_marks_split() {
        assert_eq!(
            split("Kommst du mit? Ja! Dann los."),
            vec!["Kommst du mit?", "Ja!", "Dann los."]
        );
    }

    #[test]
    fn abbreviations_do_not_split() {
        assert_eq!(
            split("Er kam z.B. mit Dr. Müller. Sie blieb."),
            vec!["Er kam z.B. mit Dr. Müller.", "Sie blieb."]
        );
    }

    #[test]
    fn ordinals_do_not_split() {
        assert_eq!(
            split("Am 3. Mai begann im 19. Jahrhundert alles. Dann kam der Krieg."),
            vec![
                "Am 3. Mai begann im 19. Jahrhundert alles.",
                "Dann kam der Krieg."
            ]
        );
    }

    #[test]
    fn year_at_sentence_end_splits() {
        assert_eq!(
            split("Er kam im Jahr 1990. Dann blieb er."),
            vec!["Er kam im Jahr 1990.", "Dann blieb er."]
        );
    }

    #[test]
    fn lowercase_continuation_does_not_split() {
        assert_eq!(split("Es ist 3.5 km weit... und dann?"), vec!["Es ist 3.5 km weit... und dann?"]);
    }

    #[test]
    fn quoted_speech_keeps_closing_quote() {
        assert_eq!(
            split("„Komm her!“ Er lief. „Warum?“, fragte sie."),
            vec!["„Komm her!“", "Er lief.", "„Warum?“, fragte sie."]
        );
    }

    #[test]
    fn extra_abbreviations_are_respected() {
        let splitter = GermanSentenceSplitter::default().with_abbreviations(["Bsp."]);
        assert_eq!(splitter.split("Siehe Bsp. Drei."), vec!["Siehe Bsp. Drei."]);
    }

    #[test]
    fn line_wraps_and_hyphenation_are_joined() {
        let paragraphs = split_paragraphs("Der Fuß-\nballverein spielt\nheute.\n\nEnde.");
        assert_eq!(paragraphs, vec!["Der Fußballverein spielt heute.", "Ende."]);
    }

    #[test]
    fn suspended_compound_keeps_hyphen() {
        assert_eq!(
            split_paragraphs("Er bereiste Nord-\nund Südamerika."),
            vec!["Er bereiste Nord- und Südamerika."]
        );
        assert_eq!(
            split_paragraphs("Ein- oder Aus-\nbau."),
            vec!["Ein- oder Ausbau."]
        );
    }

    #[test]
    fn empty_paragraphs_reserve_no_number() {
        struct NoPunctuation;
        impl SentenceSplitter for NoPunctuation {
            fn split(&self, text: &str) -> Vec<String> {
                if text.chars().any(char::is_alphabetic) {
                    vec![text.to_string()]
                } else {
                    vec![]
                }
            }
        }
        let seg = Segmenter::new(Box::new(NoPunctuation));
        let located = seg.segment_page(2, "Erster.\n\n— 12 —\n\nZweiter.");
        assert_eq!(positions(&located), vec![(2, 0, 0), (2, 1, 0)]);
    }

    #[test]
    fn segmentation_is_deterministic() {
        let seg = Segmenter::default();
        let text = "Ich gehe nach Hause. Es ist spät.\r\n\r\nMorgen ist\r\nauch ein Tag.";
        assert_eq!(seg.segment_page(0, text), seg.segment_page(0, text));
    }

    #[test]
    fn numbering_is_monotonic_across_pages() {
        let seg = Segmenter::default();
        let pages = vec![
            PageText {
                page_index: 0,
                text: "A eins. A zwei.\n\nB eins.".into(),
            },
            PageText {
                page_index: 1,
                text: "C eins.\n\nD eins. D zwei.".into(),
            },
        ];
        let located = seg.segment_pages(&pages);
        let pos = positions(&located);
        assert_eq!(pos.len(), 6);
        assert_eq!(pos[3], (1, 0, 0));
        assert!(pos.windows(2).all(|w| w[0] < w[1]), "{pos:?}");
    }

    #[test]
    fn blank_page_yields_nothing() {
        assert!(Segmenter::default().segment_page(0, "  \n\n \n").is_empty());
    }
}
