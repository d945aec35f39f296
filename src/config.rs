//! Configuration types for document-to-flashcard conversion.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built
//! via its [`PipelineConfigBuilder`]. The config is constructed once at
//! process start and passed by reference into the pipeline and the deck
//! layer; there is no global settings object.

use crate::error::FlashcardError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Completion model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Tokenizer family used to size blocks.
pub const DEFAULT_TOKENIZER_MODEL: &str = "gpt-3.5-turbo";

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Configuration for a document-to-flashcard run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_flashcards::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_block_tokens(800)
///     .concurrency(4)
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Token budget for one block submitted to semantic chunking. Default: 1000.
    ///
    /// Pages are merged whole until the next page would push the block over
    /// this budget. A single page larger than the budget still becomes its
    /// own block.
    pub max_block_tokens: usize,

    /// tiktoken model family used for counting, e.g. "gpt-3.5-turbo", "gpt-4o".
    pub tokenizer_model: String,

    /// Completion model identifier, e.g. "gpt-4o". If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum number of in-flight model calls per fan-out stage. Default: 10.
    ///
    /// Chunking issues one call per block and generation one call per
    /// approved chunk. Large documents produce hundreds of chunks, so the
    /// fan-out is gated to stay under provider rate limits.
    pub concurrency: usize,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    ///
    /// The chunking call echoes its whole block back, so this must stay
    /// comfortably above `max_block_tokens`.
    pub max_tokens: usize,

    /// Transport-level retries per model call. Default: 3.
    ///
    /// Only provider errors and timeouts are retried. A reply in the wrong
    /// format is never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// How PDF input is turned into page text. Default: [`PdfMode::Text`].
    pub pdf_mode: PdfMode,

    /// Maximum rendered image dimension in pixels ([`PdfMode::Vision`] only). Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional progress callback, fired as blocks and chunks complete.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_block_tokens: 1000,
            tokenizer_model: DEFAULT_TOKENIZER_MODEL.to_string(),
            model: None,
            provider_name: None,
            provider: None,
            concurrency: 10,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            pdf_mode: PdfMode::default(),
            max_rendered_pixels: 2000,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_block_tokens", &self.max_block_tokens)
            .field("tokenizer_model", &self.tokenizer_model)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pdf_mode", &self.pdf_mode)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The completion model id, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_block_tokens(mut self, n: usize) -> Self {
        self.config.max_block_tokens = n;
        self
    }

    pub fn tokenizer_model(mut self, model: impl Into<String>) -> Self {
        self.config.tokenizer_model = model.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdf_mode(mut self, mode: PdfMode) -> Self {
        self.config.pdf_mode = mode;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, FlashcardError> {
        let c = &self.config;
        if c.max_block_tokens == 0 {
            return Err(FlashcardError::InvalidConfig(
                "max_block_tokens must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(FlashcardError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(FlashcardError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_retries > MAX_RETRIES {
            return Err(FlashcardError::InvalidConfig(format!(
                "max_retries must be ≤ {MAX_RETRIES}, got {}",
                c.max_retries
            )));
        }
        if c.tokenizer_model.trim().is_empty() {
            return Err(FlashcardError::InvalidConfig(
                "tokenizer_model must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How PDF documents are turned into page text.
///
/// | Mode | Cost | Best for |
/// |------|------|----------|
/// | `Text` | free, instant | born-digital PDFs with a text layer |
/// | `Vision` | one VLM call per page | scans, slides, multi-column layouts |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfMode {
    /// Read the embedded text layer with pdfium. (default)
    #[default]
    Text,
    /// Rasterise each page and have a vision model transcribe it to Markdown.
    Vision,
}
