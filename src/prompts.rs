//! Prompts for sentence explanation.
//!
//! Every instruction sent to the language model lives here so prompt changes
//! never touch retry or parsing logic. Callers can override the system prompt
//! via [`crate::config::ExplainConfig::system_prompt`]; the response schema is
//! appended either way, since the parser depends on it.

use crate::model::SentenceExplanation;

/// Default system prompt for explaining one German sentence.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a patient German teacher helping an English-speaking learner read authentic German text.

For every sentence you receive:

1. TRANSLATION
   - Translate the whole sentence into natural English
   - Keep the meaning faithful; do not summarise

2. GRAMMAR
   - Explain the sentence structure: main and subordinate clauses, verb position,
     separable verbs, cases of the noun phrases, tense, mood and voice
   - Write for a learner at B1 level; be concrete, refer to words in the sentence

3. WORDS
   - Define every word of the sentence once, in order of first appearance
   - Copy each word exactly as it appears in the sentence
   - part_of_speech must be one of: noun, verb, adjective, pronoun, preposition,
     conjunction, interjection, article, numeral, punctuation, other
     (use "other" for adverbs, particles and anything else)
   - difficulty is the CEFR level (A1, A2, B1, B2, C1, C2) at which a learner
     usually meets the word
   - The meaning must carry enough grammar to understand the word in context:
     gender and plural for nouns, infinitive, tense and person for verbs,
     case for articles and prepositions, and how frequent the word is
   - Give up to three short German example sentences per word, each followed
     by its English translation in parentheses

4. OUTPUT FORMAT
   - Answer with a single JSON object and nothing else
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary before or after the JSON"#;

/// Header placed before the schema in the system message.
const SCHEMA_PREAMBLE: &str = "The JSON object MUST conform to this JSON Schema:";

/// Full system message: the (possibly overridden) prompt plus the response schema.
pub fn system_message(custom: Option<&str>) -> String {
    let prompt = custom.unwrap_or(DEFAULT_SYSTEM_PROMPT);
    format!(
        "{prompt}\n\n{SCHEMA_PREAMBLE}\n{}",
        SentenceExplanation::json_schema()
    )
}

/// User message asking for the explanation of `sentence`.
pub fn user_message(sentence: &str) -> String {
    format!(
        "Translate the following German sentence into English, explain its grammar, \
and define every word it contains:\n\n\"\"\"{sentence}\"\"\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_embeds_schema() {
        let msg = system_message(None);
        assert!(msg.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(msg.contains(SCHEMA_PREAMBLE));
        assert!(msg.contains("grammar_explanation"));
    }

    #[test]
    fn custom_prompt_still_gets_schema() {
        let msg = system_message(Some("Be brief."));
        assert!(msg.starts_with("Be brief."));
        assert!(msg.contains("word_definitions"));
    }

    #[test]
    fn user_message_quotes_sentence_verbatim() {
        let msg = user_message("Es regnet.  ");
        assert!(msg.contains("\"\"\"Es regnet.  \"\"\""));
    }
}
