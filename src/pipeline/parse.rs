//! Document parsing: raw upload bytes → ordered page texts.
//!
//! [`DocumentParser`] is the seam between the pipeline and whatever turns a
//! file into text. Implementations:
//!
//! | Parser | Input | How |
//! |--------|-------|-----|
//! | [`MarkdownParser`] | UTF-8 Markdown / plain text | pages split on form feed (`\x0C`) |
//! | [`PdfTextParser`] | PDF | pdfium text layer, one page per PDF page |
//! | [`VisionPdfParser`] | PDF | rasterise → vision model → Markdown per page |
//! | [`AutoParser`] | either | sniffs `%PDF` and dispatches |
//!
//! Parsers report every failure as [`FlashcardError::Parse`].

use crate::config::{PdfMode, PipelineConfig};
use crate::error::FlashcardError;
use crate::model::{build_options, chat_with_retry, RetryPolicy};
use crate::pipeline::{encode, postprocess, render};
use crate::prompts::PAGE_TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Page break used by text extractors (pdftotext, LlamaParse text exports…).
pub const FORM_FEED: char = '\x0C';

/// One page of extracted text, indexed by position in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub text: String,
}

impl Page {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Turns raw document bytes into ordered pages.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, bytes: &[u8]) -> Result<Vec<Page>, FlashcardError>;
}

/// Whether `bytes` start with the PDF magic number.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

fn into_pages(texts: impl IntoIterator<Item = String>) -> Vec<Page> {
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page { index, text })
        .collect()
}

// ── Markdown / plain text ────────────────────────────────────────────────

/// UTF-8 Markdown or plain text. Form feeds separate pages; text without a
/// form feed is a single page. A leading BOM is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

#[async_trait]
impl DocumentParser for MarkdownParser {
    async fn parse(&self, bytes: &[u8]) -> Result<Vec<Page>, FlashcardError> {
        let text = std::str::from_utf8(bytes).map_err(|e| FlashcardError::Parse {
            detail: format!("document is neither a PDF nor valid UTF-8 text: {}", e),
        })?;
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

        let pages = into_pages(text.split(FORM_FEED).map(str::to_string));
        debug!("Markdown document: {} pages", pages.len());
        Ok(pages)
    }
}

// ── PDF text layer ───────────────────────────────────────────────────────

/// PDF text layer via pdfium. Every page ends with a blank line so adjacent
/// pages stay separated once batched into a block.
#[derive(Debug, Clone, Default)]
pub struct PdfTextParser {
    password: Option<String>,
}

impl PdfTextParser {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

#[async_trait]
impl DocumentParser for PdfTextParser {
    async fn parse(&self, bytes: &[u8]) -> Result<Vec<Page>, FlashcardError> {
        let texts = render::extract_page_texts(bytes.to_vec(), self.password.clone()).await?;
        Ok(into_pages(texts.into_iter().map(|t| {
            let trimmed = t.trim_end();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{trimmed}\n\n")
            }
        })))
    }
}

// ── PDF via vision model ─────────────────────────────────────────────────

/// Rasterises each page and has a vision model transcribe it to Markdown.
///
/// Pages are transcribed concurrently (bounded by `concurrency`) and
/// returned in page order. One failed page fails the parse.
pub struct VisionPdfParser {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    retry: RetryPolicy,
    concurrency: usize,
    max_rendered_pixels: u32,
    password: Option<String>,
}

impl VisionPdfParser {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            retry: RetryPolicy::from(config),
            concurrency: config.concurrency,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }

    async fn transcribe(&self, page_num: usize, image: image::DynamicImage) -> Result<String, FlashcardError> {
        let image_data = encode::encode_page(&image, page_num)?;
        let messages = vec![
            ChatMessage::system(PAGE_TRANSCRIPTION_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];

        let completion = chat_with_retry(&self.provider, &messages, &self.options, self.retry)
            .await
            .map_err(|e| FlashcardError::Parse {
                detail: format!("transcription of page {} failed: {}", page_num, e),
            })?;
        Ok(postprocess::clean_page_markdown(&completion.content))
    }
}

#[async_trait]
impl DocumentParser for VisionPdfParser {
    async fn parse(&self, bytes: &[u8]) -> Result<Vec<Page>, FlashcardError> {
        let images =
            render::render_pages(bytes.to_vec(), self.password.clone(), self.max_rendered_pixels)
                .await?;
        info!("Transcribing {} pages with the vision model", images.len());

        let texts: Vec<String> = stream::iter(
            images
                .into_iter()
                .enumerate()
                .map(|(idx, image)| self.transcribe(idx + 1, image)),
        )
        .buffered(self.concurrency.max(1))
        .try_collect()
        .await?;

        Ok(into_pages(texts))
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────

/// Routes PDFs to the configured PDF parser and everything else to
/// [`MarkdownParser`].
pub struct AutoParser {
    pdf: Arc<dyn DocumentParser>,
    text: MarkdownParser,
}

impl AutoParser {
    pub fn new(pdf: Arc<dyn DocumentParser>) -> Self {
        Self {
            pdf,
            text: MarkdownParser,
        }
    }

    /// Pick the PDF parser from `config.pdf_mode`. Vision mode needs `provider`.
    pub fn from_config(config: &PipelineConfig, provider: &Arc<dyn LLMProvider>) -> Self {
        let pdf: Arc<dyn DocumentParser> = match config.pdf_mode {
            PdfMode::Text => Arc::new(PdfTextParser::new(config.password.clone())),
            PdfMode::Vision => Arc::new(VisionPdfParser::new(Arc::clone(provider), config)),
        };
        Self::new(pdf)
    }
}

#[async_trait]
impl DocumentParser for AutoParser {
    async fn parse(&self, bytes: &[u8]) -> Result<Vec<Page>, FlashcardError> {
        if is_pdf(bytes) {
            self.pdf.parse(bytes).await
        } else {
            self.text.parse(bytes).await
        }
    }
}
