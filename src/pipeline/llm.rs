//! Extraction model call: send the assembled text, get a JSON candidate.
//!
//! All prompt text lives in [`crate::prompts`]; this module only owns the
//! call, its timeout and the retry loop.
//!
//! ## Retry Strategy
//!
//! Rate limits, timeouts and 5xx responses are transient. Each attempt is
//! bounded by `api_timeout_secs` and followed by an exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms base and 3 retries the
//! waits are 500 ms → 1 s → 2 s. Authentication failures and rejected
//! requests (unknown model, context too long) are returned immediately.

use crate::config::ParseConfig;
use crate::error::{PipelineError, UnavailableReason};
use crate::prompts::{document_message, extraction_prompt};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Sampling options for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A model answer with its token usage.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A failed completion, already classified.
#[derive(Debug, Clone)]
pub struct ModelError {
    pub reason: UnavailableReason,
    pub detail: String,
}

impl ModelError {
    pub fn new(reason: UnavailableReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// A text-in, text-out chat model.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Provider/model label for logs.
    fn label(&self) -> String;

    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: &ModelOptions,
    ) -> Result<ModelReply, ModelError>;
}

/// [`CompletionModel`] backed by an `edgequake-llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderModel {
    /// `label` names the provider/model pair in logs.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }
}

#[async_trait]
impl CompletionModel for ProviderModel {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: &ModelOptions,
    ) -> Result<ModelReply, ModelError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let opts = CompletionOptions {
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&opts)).await {
            Ok(response) => Ok(ModelReply {
                content: response.content,
                prompt_tokens: response.prompt_tokens,
                completion_tokens: response.completion_tokens,
            }),
            Err(e) => Err(ModelError::new(classify_llm_error(&e), e.to_string())),
        }
    }
}

static RETRY_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry[- _]after[^0-9]{0,8}(\d+)").unwrap());
static AUTH_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:401|403)\b").unwrap());
static RATE_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b429\b").unwrap());

fn retry_after(message: &str) -> Option<u64> {
    RETRY_AFTER
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|d| d.as_str().parse().ok())
}

/// Classify a typed provider error.
///
/// Only the catch-all variants carry a raw provider body; those fall back
/// to [`classify_failure`].
pub fn classify_llm_error(error: &LlmError) -> UnavailableReason {
    match error {
        LlmError::RateLimited(msg) => UnavailableReason::RateLimited {
            retry_after_secs: retry_after(msg),
        },
        LlmError::AuthError(_) => UnavailableReason::Authentication,
        LlmError::TokenLimitExceeded { .. }
        | LlmError::ModelNotFound(_)
        | LlmError::InvalidRequest(_)
        | LlmError::ConfigError(_)
        | LlmError::NotSupported(_) => UnavailableReason::Rejected,
        LlmError::NetworkError(_) => UnavailableReason::Network,
        LlmError::Timeout => UnavailableReason::Timeout { secs: 0 },
        LlmError::ApiError(msg) | LlmError::ProviderError(msg) | LlmError::Unknown(msg) => {
            classify_failure(msg)
        }
        _ => UnavailableReason::Provider,
    }
}

/// Classify a raw provider error body.
///
/// Status codes must stand alone, so a token count such as `4030` is not
/// read as a 403.
pub fn classify_failure(message: &str) -> UnavailableReason {
    let m = message.to_lowercase();
    if AUTH_STATUS.is_match(&m)
        || m.contains("unauthorized")
        || m.contains("forbidden")
        || m.contains("invalid api key")
        || m.contains("invalid_api_key")
        || m.contains("authentication")
    {
        UnavailableReason::Authentication
    } else if RATE_STATUS.is_match(&m)
        || m.contains("rate limit")
        || m.contains("rate_limit")
        || m.contains("quota")
    {
        UnavailableReason::RateLimited {
            retry_after_secs: retry_after(message),
        }
    } else if m.contains("model_not_found")
        || m.contains("context_length_exceeded")
        || m.contains("invalid_request")
    {
        UnavailableReason::Rejected
    } else if m.contains("timed out") || m.contains("timeout") {
        UnavailableReason::Timeout { secs: 0 }
    } else if m.contains("connection")
        || m.contains("dns")
        || m.contains("tls")
        || m.contains("network")
        || m.contains("reset by peer")
    {
        UnavailableReason::Network
    } else {
        UnavailableReason::Provider
    }
}

/// Raw model output for one document.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub raw: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Upper bound on any single wait between attempts.
const MAX_BACKOFF_MS: u64 = 60_000;

/// `base * 2^(attempt-1)`, saturating and capped at [`MAX_BACKOFF_MS`].
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_MS)
}

/// Upper bound on a provider's retry-after hint.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Send the assembled text to the model and return its raw answer.
pub async fn extract_candidate(
    model: &dyn CompletionModel,
    text: &str,
    truncated: bool,
    config: &ParseConfig,
) -> Result<Candidate, PipelineError> {
    let start = Instant::now();
    let system = match &config.system_prompt {
        Some(custom) => custom.clone(),
        None => extraction_prompt(config.industry_vocabulary.as_deref()),
    };
    let user = document_message(text, truncated);
    let options = ModelOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<ModelError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let mut backoff = backoff_ms(config.retry_backoff_ms, attempt);
            if let Some(UnavailableReason::RateLimited {
                retry_after_secs: Some(secs),
            }) = last_err.as_ref().map(|e| &e.reason)
            {
                backoff = backoff.max((*secs).min(MAX_RETRY_AFTER_SECS) * 1000);
            }
            warn!(
                "{}: retry {}/{} after {}ms",
                model.label(),
                attempt,
                config.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match tokio::time::timeout(call_timeout, model.complete(&system, &user, &options)).await
        {
            Ok(r) => r,
            Err(_) => Err(ModelError::new(
                UnavailableReason::Timeout {
                    secs: config.api_timeout_secs,
                },
                format!("no response within {}s", config.api_timeout_secs),
            )),
        };

        match outcome {
            Ok(reply) => {
                let duration = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    model.label(),
                    reply.prompt_tokens,
                    reply.completion_tokens,
                    duration
                );
                return Ok(Candidate {
                    raw: reply.content,
                    input_tokens: reply.prompt_tokens,
                    output_tokens: reply.completion_tokens,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(mut e) => {
                if let UnavailableReason::Timeout { secs: 0 } = e.reason {
                    e.reason = UnavailableReason::Timeout {
                        secs: config.api_timeout_secs,
                    };
                }
                warn!(
                    "{}: attempt {} failed ({}): {}",
                    model.label(),
                    attempt + 1,
                    e.reason,
                    e.detail
                );
                let fatal = e.reason.is_permanent();
                last_err = Some(e);
                if fatal {
                    break;
                }
            }
        }
    }

    let err = last_err.unwrap_or_else(|| ModelError::new(UnavailableReason::Provider, "unknown error"));
    Err(PipelineError::ExtractionUnavailable {
        reason: err.reason,
        detail: err.detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed sequence of outcomes.
    struct Replay {
        script: Mutex<Vec<Result<ModelReply, ModelError>>>,
        calls: Mutex<u32>,
    }

    impl Replay {
        fn new(mut script: Vec<Result<ModelReply, ModelError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CompletionModel for Replay {
        fn label(&self) -> String {
            "replay".into()
        }

        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &ModelOptions,
        ) -> Result<ModelReply, ModelError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ModelError::new(UnavailableReason::Provider, "exhausted")))
        }
    }

    fn ok(content: &str) -> Result<ModelReply, ModelError> {
        Ok(ModelReply {
            content: content.into(),
            prompt_tokens: 100,
            completion_tokens: 20,
        })
    }

    fn fast_config() -> ParseConfig {
        ParseConfig::builder().retry_backoff_ms(1).build().unwrap()
    }

    #[test]
    fn classifies_common_failures() {
        assert_eq!(
            classify_failure("HTTP 401 Unauthorized"),
            UnavailableReason::Authentication
        );
        assert_eq!(
            classify_failure("429 Too Many Requests, retry-after: 12"),
            UnavailableReason::RateLimited {
                retry_after_secs: Some(12)
            }
        );
        assert_eq!(
            classify_failure("rate limit exceeded"),
            UnavailableReason::RateLimited {
                retry_after_secs: None
            }
        );
        assert_eq!(
            classify_failure("error sending request: connection refused"),
            UnavailableReason::Network
        );
        assert_eq!(classify_failure("502 Bad Gateway"), UnavailableReason::Provider);
    }

    #[test]
    fn status_codes_must_stand_alone() {
        assert_eq!(
            classify_failure("Token limit exceeded: max 4030, got 5000"),
            UnavailableReason::Provider
        );
        assert_eq!(
            classify_failure("upstream returned 403"),
            UnavailableReason::Authentication
        );
        assert_eq!(
            classify_failure("{\"error\":{\"code\":\"model_not_found\"}}"),
            UnavailableReason::Rejected
        );
    }

    #[test]
    fn typed_errors_classify_by_variant() {
        assert_eq!(
            classify_llm_error(&LlmError::TokenLimitExceeded { max: 4030, got: 5000 }),
            UnavailableReason::Rejected
        );
        assert_eq!(
            classify_llm_error(&LlmError::ModelNotFound("gpt-x".into())),
            UnavailableReason::Rejected
        );
        assert_eq!(
            classify_llm_error(&LlmError::AuthError("bad key".into())),
            UnavailableReason::Authentication
        );
        assert_eq!(
            classify_llm_error(&LlmError::RateLimited("retry after 7 seconds".into())),
            UnavailableReason::RateLimited {
                retry_after_secs: Some(7)
            }
        );
        assert_eq!(
            classify_llm_error(&LlmError::NetworkError("reset".into())),
            UnavailableReason::Network
        );
        assert_eq!(
            classify_llm_error(&LlmError::ApiError("503 overloaded".into())),
            UnavailableReason::Provider
        );
        assert!(UnavailableReason::Rejected.is_permanent());
    }

    #[test]
    fn backoff_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 3), 2_000);
        assert_eq!(backoff_ms(500, 64), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(u64::MAX, 2), MAX_BACKOFF_MS);
    }

    #[tokio::test]
    async fn rejected_request_is_not_retried() {
        let model = Replay::new(vec![Err(ModelError::new(
            UnavailableReason::Rejected,
            "Model not found: gpt-x",
        ))]);
        let err = extract_candidate(&model, "text", false, &fast_config())
            .await
            .unwrap_err();
        assert_eq!(model.calls(), 1);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn first_success_has_no_retries() {
        let model = Replay::new(vec![ok("{}")]);
        let c = extract_candidate(&model, "text", false, &fast_config())
            .await
            .unwrap();
        assert_eq!(c.raw, "{}");
        assert_eq!(c.retries, 0);
        assert_eq!(c.input_tokens, 100);
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let model = Replay::new(vec![
            Err(ModelError::new(
                UnavailableReason::RateLimited {
                    retry_after_secs: None,
                },
                "429",
            )),
            ok("{\"full_name\":\"A\"}"),
        ]);
        let c = extract_candidate(&model, "text", false, &fast_config())
            .await
            .unwrap();
        assert_eq!(c.retries, 1);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn authentication_is_not_retried() {
        let model = Replay::new(vec![Err(ModelError::new(
            UnavailableReason::Authentication,
            "invalid api key",
        ))]);
        let err = extract_candidate(&model, "text", false, &fast_config())
            .await
            .unwrap_err();
        assert_eq!(model.calls(), 1);
        assert!(matches!(
            err,
            PipelineError::ExtractionUnavailable {
                reason: UnavailableReason::Authentication,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn exhausted_retries_fail() {
        let model = Replay::new(vec![]);
        let err = extract_candidate(&model, "text", false, &fast_config())
            .await
            .unwrap_err();
        assert_eq!(model.calls(), 4);
        assert!(err.is_retryable());
    }
}
