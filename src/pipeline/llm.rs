//! Sentence explanation requests: cache first, then the language model.
//!
//! All prompt text lives in [`crate::prompts`]; this module only drives the
//! call, the retries and the parsing.
//!
//! ## Retry Strategy
//!
//! Transport failures (HTTP 429 / 503, connection resets, per-call timeouts)
//! are retried with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`):
//! with a 500 ms base and 2 retries the waits are 500 ms → 1 s.
//!
//! A reply that arrives but is not a valid explanation is *not* retried.
//! The same prompt at the same temperature tends to produce the same broken
//! answer, and every extra call costs money.

use crate::config::ExplainConfig;
use crate::error::SentenceError;
use crate::model::SentenceExplanation;
use crate::pipeline::cache::ExplanationCache;
use crate::pipeline::postprocess;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Sampling settings for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl RequestOptions {
    pub fn from_config(config: &ExplainConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Raw text returned by a language model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A chat model that answers one system + user message pair.
///
/// [`ProviderModel`] adapts any edgequake-llm provider. Implement this trait
/// directly to plug in a local model or a test double.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion. The error string is logged and surfaced in
    /// [`SentenceError::LlmFailed`].
    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: &RequestOptions,
    ) -> Result<ModelReply, String>;
}

/// [`LanguageModel`] backed by an edgequake-llm provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LanguageModel for ProviderModel {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: &RequestOptions,
    ) -> Result<ModelReply, String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let completion = build_options(options);

        let response = self
            .provider
            .chat(&messages, Some(&completion))
            .await
            .map_err(|e| e.to_string())?;

        Ok(ModelReply {
            content: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Build `CompletionOptions` for an explanation call.
///
/// JSON mode is always requested; providers without it ignore the field and
/// rely on the schema in the system message.
fn build_options(options: &RequestOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_tokens),
        response_format: Some("json_object".to_string()),
        ..Default::default()
    }
}

/// What happened to one explanation request.
///
/// Always returned, never propagated: the caller applies the error policy.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub result: Result<SentenceExplanation, SentenceError>,
    /// Answered from the cache; no model call was made.
    pub cached: bool,
    /// Model calls issued, retries included.
    pub llm_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

impl RequestOutcome {
    fn from_cache(explanation: SentenceExplanation, duration_ms: u64) -> Self {
        Self {
            result: Ok(explanation),
            cached: true,
            llm_calls: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
        }
    }
}

/// Explain `sentence`, consulting and filling the cache.
///
/// A cache hit returns immediately. On a miss the model is asked, the reply
/// cleaned, parsed and validated, and the result stored before returning. An
/// explanation that fails to parse or validate is never stored.
pub async fn request_explanation(
    model: &dyn LanguageModel,
    cache: &ExplanationCache,
    sentence: &str,
    config: &ExplainConfig,
) -> RequestOutcome {
    let start = Instant::now();

    if let Some(explanation) = cache.lookup(sentence).await {
        debug!("Cache hit: {:?}", sentence);
        return RequestOutcome::from_cache(explanation, start.elapsed().as_millis() as u64);
    }
    debug!("Cache miss: {:?}", sentence);

    let system = prompts::system_message(config.system_prompt.as_deref());
    let user = prompts::user_message(sentence);
    let options = RequestOptions::from_config(config);

    let mut outcome = RequestOutcome {
        result: Err(SentenceError::LlmFailed {
            sentence: sentence.to_string(),
            retries: 0,
            detail: "no attempt made".to_string(),
        }),
        cached: false,
        llm_calls: 0,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
    };

    let call = call_with_retry(model, &system, &user, &options, sentence, config, &mut outcome);
    let reply = match call.await {
        Ok(reply) => reply,
        Err(e) => {
            outcome.result = Err(e);
            outcome.duration_ms = start.elapsed().as_millis() as u64;
            return outcome;
        }
    };

    outcome.result = match parse_explanation(sentence, &reply.content) {
        Ok(explanation) => match cache.store(sentence, &explanation).await {
            Ok(()) => Ok(explanation),
            Err(e) => Err(SentenceError::CacheWriteFailed {
                sentence: sentence.to_string(),
                path: cache.path().to_path_buf(),
                detail: e.to_string(),
            }),
        },
        Err(e) => Err(e),
    };
    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome
}

/// Wait before retry number `attempt` (1-based), saturating at `u64::MAX`.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    match 2u64.checked_pow(attempt.saturating_sub(1)) {
        Some(factor) => base_ms.saturating_mul(factor),
        None if base_ms == 0 => 0,
        None => u64::MAX,
    }
}

/// Call the model until it answers or the retries run out.
async fn call_with_retry(
    model: &dyn LanguageModel,
    system: &str,
    user: &str,
    options: &RequestOptions,
    sentence: &str,
    config: &ExplainConfig,
    outcome: &mut RequestOutcome,
) -> Result<ModelReply, SentenceError> {
    let per_call = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<SentenceError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{:?}: retry {}/{} after {}ms",
                sentence, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        outcome.llm_calls += 1;
        match timeout(per_call, model.complete(system, user, options)).await {
            Ok(Ok(reply)) => {
                debug!(
                    "{:?}: {} input tokens, {} output tokens",
                    sentence, reply.input_tokens, reply.output_tokens
                );
                outcome.input_tokens += reply.input_tokens;
                outcome.output_tokens += reply.output_tokens;
                return Ok(reply);
            }
            Ok(Err(detail)) => {
                warn!("{:?}: attempt {} failed: {}", sentence, attempt + 1, detail);
                last_err = Some(SentenceError::LlmFailed {
                    sentence: sentence.to_string(),
                    retries: config.max_retries,
                    detail,
                });
            }
            Err(_) => {
                warn!(
                    "{:?}: attempt {} timed out after {}s",
                    sentence,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(SentenceError::Timeout {
                    sentence: sentence.to_string(),
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| SentenceError::LlmFailed {
        sentence: sentence.to_string(),
        retries: config.max_retries,
        detail: "Unknown error".to_string(),
    }))
}

/// Turn a raw model reply into a validated explanation.
pub fn parse_explanation(sentence: &str, raw: &str) -> Result<SentenceExplanation, SentenceError> {
    let invalid = |detail: String| SentenceError::InvalidResponse {
        sentence: sentence.to_string(),
        detail,
    };

    let cleaned = postprocess::clean_response(raw);
    let explanation: SentenceExplanation =
        serde_json::from_str(&cleaned).map_err(|e| invalid(e.to_string()))?;
    explanation.validate().map_err(invalid)?;
    Ok(explanation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const VALID: &str = r#"{
        "translation": "It is raining.",
        "grammar_explanation": "Impersonal construction with 'es'.",
        "word_definitions": [
            {"word": "Es", "part_of_speech": "pronoun", "meaning": "it (dummy subject)", "examples": []},
            {"word": "regnet", "part_of_speech": "verb", "meaning": "rains (regnen)", "examples": ["Morgen regnet es. (It will rain tomorrow.)"]}
        ]
    }"#;

    /// Replies with the scripted answers in order, then repeats the last one.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &RequestOptions,
        ) -> Result<ModelReply, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            let next = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            next.unwrap_or_else(|| Err("script exhausted".into()))
                .map(|content| ModelReply {
                    content,
                    input_tokens: 100,
                    output_tokens: 50,
                })
        }
    }

    /// Never answers within the timeout.
    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &RequestOptions,
        ) -> Result<ModelReply, String> {
            sleep(Duration::from_secs(3600)).await;
            Err("unreachable".into())
        }
    }

    fn config() -> ExplainConfig {
        ExplainConfig::builder()
            .retry_backoff_ms(1)
            .max_retries(2)
            .build()
            .unwrap()
    }

    fn cache(dir: &TempDir) -> ExplanationCache {
        ExplanationCache::new(dir.path().join("cache.json"))
    }

    #[test]
    fn options_follow_config() {
        let opts = RequestOptions::from_config(&ExplainConfig::default());
        assert_eq!(opts.temperature, 0.2);
        assert_eq!(opts.max_tokens, 4096);
    }

    #[test]
    fn completion_options_request_json() {
        let opts = build_options(&RequestOptions::from_config(&ExplainConfig::default()));
        assert_eq!(opts.response_format.as_deref(), Some("json_object"));
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 60), u64::MAX);
        assert_eq!(backoff_ms(500, 100), u64::MAX);
        assert_eq!(backoff_ms(0, 100), 0);
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let model = ScriptedModel::new(vec![Ok(VALID)]);

        let first = request_explanation(&model, &cache, "Es regnet.", &config()).await;
        assert!(!first.cached);
        assert_eq!(first.llm_calls, 1);
        assert_eq!(first.input_tokens, 100);
        let explanation = first.result.unwrap();
        assert_eq!(explanation.translation, "It is raining.");

        let second = request_explanation(&model, &cache, "Es regnet.", &config()).await;
        assert!(second.cached);
        assert_eq!(second.llm_calls, 0);
        assert_eq!(second.result.unwrap(), explanation);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn fenced_reply_is_accepted() {
        let dir = TempDir::new().unwrap();
        let fenced = format!("```json\n{VALID}\n```");
        let model = ScriptedModel::new(vec![Ok(fenced.as_str())]);
        let outcome = request_explanation(&model, &cache(&dir), "Es regnet.", &config()).await;
        assert!(outcome.result.is_ok());
    }

    #[tokio::test]
    async fn invalid_json_is_not_retried_or_cached() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let model = ScriptedModel::new(vec![Ok("Sorry, I can't do that.")]);

        let outcome = request_explanation(&model, &cache, "Es regnet.", &config()).await;
        assert!(matches!(
            outcome.result,
            Err(SentenceError::InvalidResponse { .. })
        ));
        assert_eq!(model.calls(), 1);
        assert!(cache.lookup("Es regnet.").await.is_none());
    }

    #[tokio::test]
    async fn schema_violation_is_invalid_response() {
        let dir = TempDir::new().unwrap();
        let model = ScriptedModel::new(vec![Ok(
            r#"{"translation": "", "grammar_explanation": "x", "word_definitions": []}"#,
        )]);
        let outcome = request_explanation(&model, &cache(&dir), "Es regnet.", &config()).await;
        match outcome.result {
            Err(SentenceError::InvalidResponse { sentence, .. }) => assert_eq!(sentence, "Es regnet."),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_errors_are_retried() {
        let dir = TempDir::new().unwrap();
        let model = ScriptedModel::new(vec![Err("HTTP 503"), Err("HTTP 429"), Ok(VALID)]);
        let outcome = request_explanation(&model, &cache(&dir), "Es regnet.", &config()).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.llm_calls, 3);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let dir = TempDir::new().unwrap();
        let model = ScriptedModel::new(vec![Err("HTTP 500")]);
        let outcome = request_explanation(&model, &cache(&dir), "Es regnet.", &config()).await;
        match outcome.result {
            Err(SentenceError::LlmFailed { retries, detail, .. }) => {
                assert_eq!(retries, 2);
                assert_eq!(detail, "HTTP 500");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let dir = TempDir::new().unwrap();
        let config = ExplainConfig::builder()
            .api_timeout_secs(5)
            .max_retries(0)
            .build()
            .unwrap();
        let outcome = request_explanation(&SlowModel, &cache(&dir), "Es regnet.", &config).await;
        assert!(matches!(
            outcome.result,
            Err(SentenceError::Timeout { secs: 5, .. })
        ));
        assert_eq!(outcome.llm_calls, 1);
    }

    #[test]
    fn parse_explanation_reports_serde_detail() {
        let err = parse_explanation("Es regnet.", r#"{"translation": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("grammar_explanation"), "got: {err}");
    }
}
