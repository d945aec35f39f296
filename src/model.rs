//! Text-completion seam: the [`CompletionModel`] trait and its edgequake-llm
//! implementation.
//!
//! The pipeline only ever needs "send this prompt, give me the reply text",
//! so that is the whole trait. Tests substitute scripted in-memory models;
//! production wraps an `Arc<dyn LLMProvider>` in [`ProviderModel`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. [`chat_with_retry`] retries provider errors and
//! per-call timeouts with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). Parsing failures happen above this
//! layer and are never retried.

use crate::config::PipelineConfig;
use crate::error::{FlashcardError, ModelError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One model reply plus its token usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl Completion {
    /// A reply with no usage accounting.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Asynchronous text completion: one prompt in, one reply out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, ModelError>;
}

/// Timeout and backoff settings for one provider call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

/// [`CompletionModel`] backed by an edgequake-llm provider.
///
/// Each prompt is sent as a single user message.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    retry: RetryPolicy,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            retry: RetryPolicy::from(config),
        }
    }
}

#[async_trait]
impl CompletionModel for ProviderModel {
    async fn complete(&self, prompt: &str) -> Result<Completion, ModelError> {
        let messages = vec![ChatMessage::user(prompt)];
        chat_with_retry(&self.provider, &messages, &self.options, self.retry).await
    }
}

/// Longest pause between two attempts.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry `attempt` (1-based): `base_ms * 2^(attempt-1)`, capped
/// at [`MAX_BACKOFF_MS`].
pub fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Send `messages` to `provider`, retrying timeouts and provider errors.
pub async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    retry: RetryPolicy,
) -> Result<Completion, ModelError> {
    let start = Instant::now();
    let mut last_err: Option<ModelError> = None;

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay_ms(retry.backoff_ms, attempt);
            warn!(
                "Model call: retry {}/{} after {}ms",
                attempt, retry.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.chat(messages, Some(options));
        match timeout(Duration::from_secs(retry.timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "Model call: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(Completion {
                    content: response.content,
                    prompt_tokens: response.prompt_tokens as usize,
                    completion_tokens: response.completion_tokens as usize,
                });
            }
            Ok(Err(e)) => {
                let message = format!("{}", e);
                warn!("Model call: attempt {} failed: {}", attempt + 1, message);
                last_err = Some(ModelError::Api { message });
            }
            Err(_) => {
                warn!(
                    "Model call: attempt {} timed out after {}s",
                    attempt + 1,
                    retry.timeout_secs
                );
                last_err = Some(ModelError::Timeout {
                    secs: retry.timeout_secs,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ModelError::Api {
        message: "Unknown error".to_string(),
    }))
}

/// Build `CompletionOptions` from the pipeline config.
pub fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, FlashcardError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // Users holding several provider keys default to OpenAI unless they
    // name another provider explicitly.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FlashcardError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FlashcardError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FlashcardError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn retry_policy_from_config() {
        let config = PipelineConfig::builder()
            .max_retries(5)
            .retry_backoff_ms(10)
            .api_timeout_secs(7)
            .build()
            .unwrap();
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff_ms, 10);
        assert_eq!(policy.timeout_secs, 7);
    }

    #[test]
    fn backoff_doubles_from_base() {
        assert_eq!(backoff_delay_ms(500, 1), 500);
        assert_eq!(backoff_delay_ms(500, 2), 1_000);
        assert_eq!(backoff_delay_ms(500, 4), 4_000);
    }

    #[test]
    fn backoff_is_capped_for_large_attempts() {
        assert_eq!(backoff_delay_ms(500, 10), 60_000);
        assert_eq!(backoff_delay_ms(500, 64), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(500, u32::MAX), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(u64::MAX, 3), MAX_BACKOFF_MS);
    }

    #[test]
    fn completion_text_has_no_usage() {
        let c = Completion::text("hi");
        assert_eq!(c.content, "hi");
        assert_eq!(c.prompt_tokens + c.completion_tokens, 0);
    }
}
