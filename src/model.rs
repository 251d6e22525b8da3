//! Domain types: where a sentence sits in the document and what the model
//! said about it.
//!
//! [`SentenceExplanation`] doubles as the response contract for the language
//! model. Its JSON schema is derived with `schemars` and embedded in the
//! prompt, and [`SentenceExplanation::validate`] rejects payloads that parse
//! but are unusable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One sentence and its coordinates in the source document.
///
/// All indices are 0-based; paragraph numbers reset per page and sentence
/// numbers reset per paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatedSentence {
    pub page_number: usize,
    pub paragraph_number: usize,
    pub sentence_number: usize,
    /// Exact sentence text. Used verbatim as the cache key.
    pub sentence: String,
}

impl LocatedSentence {
    /// `(page, paragraph, sentence)` tuple, ordered lexicographically.
    pub fn position(&self) -> (usize, usize, usize) {
        (self.page_number, self.paragraph_number, self.sentence_number)
    }
}

/// Closed set of word classes the model may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Pronoun,
    Preposition,
    Conjunction,
    Interjection,
    Article,
    Numeral,
    Punctuation,
    Other,
}

impl PartOfSpeech {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Pronoun => "pronoun",
            PartOfSpeech::Preposition => "preposition",
            PartOfSpeech::Conjunction => "conjunction",
            PartOfSpeech::Interjection => "interjection",
            PartOfSpeech::Article => "article",
            PartOfSpeech::Numeral => "numeral",
            PartOfSpeech::Punctuation => "punctuation",
            PartOfSpeech::Other => "other",
        }
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common European Framework level at which a learner usually meets a word.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annotation for one word of a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WordExplanation {
    /// The word exactly as it appears in the sentence.
    pub word: String,
    /// Word class of this occurrence.
    pub part_of_speech: PartOfSpeech,
    /// CEFR level of the word. Absent in entries cached before levels existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<CefrLevel>,
    /// English meaning with grammatical detail: gender and plural for nouns,
    /// tense, person and infinitive for verbs, case for articles and
    /// prepositions, how common the word is.
    pub meaning: String,
    /// Short German example sentences using the word, each with an English
    /// translation in parentheses.
    pub examples: Vec<String>,
}

/// Translation and grammatical annotation of one sentence.
///
/// Produced, cached and consumed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SentenceExplanation {
    /// Natural English translation of the whole sentence.
    pub translation: String,
    /// Prose explanation of the sentence's grammar: clause structure, word
    /// order, cases, tenses and moods.
    pub grammar_explanation: String,
    /// One entry per distinct word of the sentence, in order of appearance.
    pub word_definitions: Vec<WordExplanation>,
}

impl SentenceExplanation {
    /// Reject explanations that parsed but carry no usable content.
    pub fn validate(&self) -> Result<(), String> {
        if self.translation.trim().is_empty() {
            return Err("`translation` is empty".into());
        }
        if let Some(i) = self
            .word_definitions
            .iter()
            .position(|w| w.word.trim().is_empty())
        {
            return Err(format!("`word_definitions[{i}].word` is empty"));
        }
        Ok(())
    }

    /// Pretty-printed JSON schema of this type, as sent to the model.
    pub fn json_schema() -> String {
        let schema = schemars::schema_for!(SentenceExplanation);
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    }
}
