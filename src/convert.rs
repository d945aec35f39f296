//! Document → flashcards orchestration.
//!
//! [`DocumentPipeline`] runs the stages strictly in sequence:
//!
//! ```text
//! parse → batch → chunk (fan-out) → filter → generate (fan-out)
//! ```
//!
//! Either every stage succeeds and the caller gets the flashcards in chunk
//! order, or the first failure aborts the run and is returned as a
//! [`FlashcardError`] whose [`FlashcardError::stage`] names the stage. The
//! pipeline never retries a stage and never returns a partial card list.
//! Persisting the result is the caller's job; see [`import_document`].

use crate::config::PipelineConfig;
use crate::deck::{DeckStore, StoredFlashcard};
use crate::error::{FlashcardError, Stage};
use crate::model::{resolve_provider, CompletionModel, ProviderModel};
use crate::output::{Flashcard, PipelineOutput, PipelineStats};
use crate::pipeline::parse::{AutoParser, DocumentParser, Page};
use crate::pipeline::{batch, chunk, filter, flashcard};
use crate::tokens::{TiktokenCounter, TokenCounter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// The document-to-flashcard pipeline with its collaborators.
pub struct DocumentPipeline {
    config: PipelineConfig,
    parser: Arc<dyn DocumentParser>,
    tokens: Arc<dyn TokenCounter>,
    model: Arc<dyn CompletionModel>,
}

impl DocumentPipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        parser: Arc<dyn DocumentParser>,
        tokens: Arc<dyn TokenCounter>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            config,
            parser,
            tokens,
            model,
        }
    }

    /// Build the production pipeline: resolved LLM provider, tiktoken counter
    /// for `config.tokenizer_model`, and [`AutoParser`].
    ///
    /// # Errors
    /// `ProviderNotConfigured` when no provider can be resolved,
    /// `Tokenization` when the tokenizer model is unknown.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, FlashcardError> {
        let provider = resolve_provider(config)?;
        let tokens = TiktokenCounter::for_model(&config.tokenizer_model)?;
        let parser = AutoParser::from_config(config, &provider);
        let model = ProviderModel::new(provider, config);

        Ok(Self::new(
            config.clone(),
            Arc::new(parser),
            Arc::new(tokens),
            Arc::new(model),
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Turn raw document bytes into ordered flashcards.
    pub async fn process_document(&self, bytes: &[u8]) -> Result<Vec<Flashcard>, FlashcardError> {
        Ok(self.run(bytes).await?.flashcards)
    }

    /// Run every stage and return flashcards together with run statistics.
    pub async fn run(&self, bytes: &[u8]) -> Result<PipelineOutput, FlashcardError> {
        let total_start = Instant::now();
        let progress = self.config.progress_callback.as_ref();
        let mut stats = PipelineStats::default();

        if bytes.is_empty() {
            return Err(FlashcardError::EmptyDocument);
        }

        // ── Stage 1: Parse ───────────────────────────────────────────────
        if let Some(cb) = progress {
            cb.on_stage_start(Stage::Parse);
        }
        let parse_start = Instant::now();
        let pages = self.parser.parse(bytes).await?;
        ensure_content(&pages)?;
        stats.pages = pages.len();
        stats.parse_duration_ms = parse_start.elapsed().as_millis() as u64;
        info!("Parsed {} pages in {}ms", pages.len(), stats.parse_duration_ms);

        if let Some(cb) = progress {
            cb.on_pipeline_start(pages.len());
        }

        // ── Stage 2: Batch ───────────────────────────────────────────────
        if let Some(cb) = progress {
            cb.on_stage_start(Stage::Batch);
        }
        let blocks = batch::batch_pages(&pages, self.tokens.as_ref(), self.config.max_block_tokens);
        stats.blocks = blocks.len();
        info!(
            "Batched {} pages into {} blocks (≤{} tokens)",
            pages.len(),
            blocks.len(),
            self.config.max_block_tokens
        );

        // ── Stage 3: Chunk ───────────────────────────────────────────────
        if let Some(cb) = progress {
            cb.on_stage_start(Stage::Chunk);
        }
        let chunk_start = Instant::now();
        let chunked = chunk::chunk_blocks(
            self.model.as_ref(),
            &blocks,
            self.config.concurrency,
            progress,
        )
        .await?;
        stats.chunks = chunked.chunks.len();
        stats.chunk_duration_ms = chunk_start.elapsed().as_millis() as u64;

        // ── Stage 4: Filter ──────────────────────────────────────────────
        if let Some(cb) = progress {
            cb.on_stage_start(Stage::Filter);
        }
        let (approved, flagged) = filter::filter_chunks(chunked.chunks);
        stats.approved_chunks = approved.len();
        stats.flagged_chunks = flagged.len();
        if !flagged.is_empty() {
            warn!(
                "Discarding {} header-only or blank chunks",
                flagged.len()
            );
        }

        // ── Stage 5: Generate ────────────────────────────────────────────
        if let Some(cb) = progress {
            cb.on_stage_start(Stage::Generate);
        }
        let generate_start = Instant::now();
        let generated = flashcard::generate_flashcards(
            self.model.as_ref(),
            &approved,
            self.config.concurrency,
            progress,
        )
        .await?;
        stats.generate_duration_ms = generate_start.elapsed().as_millis() as u64;

        let mut usage = chunked.usage;
        usage.merge(generated.usage);
        stats.model_calls = usage.calls;
        stats.total_prompt_tokens = usage.prompt_tokens;
        stats.total_completion_tokens = usage.completion_tokens;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Generated {} flashcards from {} chunks, {}ms total",
            generated.flashcards.len(),
            stats.chunks,
            stats.total_duration_ms
        );
        if let Some(cb) = progress {
            cb.on_pipeline_complete(generated.flashcards.len());
        }

        Ok(PipelineOutput {
            flashcards: generated.flashcards,
            flagged_chunks: flagged,
            stats,
        })
    }
}

/// A parse that yields no pages, or only blank ones, found no content.
fn ensure_content(pages: &[Page]) -> Result<(), FlashcardError> {
    if pages.is_empty() {
        return Err(FlashcardError::Parse {
            detail: "parser returned no pages".to_string(),
        });
    }
    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(FlashcardError::Parse {
            detail: format!("all {} pages are empty", pages.len()),
        });
    }
    Ok(())
}

/// Turn `bytes` into flashcards with the production pipeline for `config`.
pub async fn process_document(
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<Vec<Flashcard>, FlashcardError> {
    DocumentPipeline::from_config(config)?
        .process_document(bytes)
        .await
}

/// Generate flashcards from an uploaded document and store them in a deck.
///
/// Ownership of the deck is checked before any model call is made. Cards are
/// inserted only if the whole pipeline succeeded, in chunk order.
pub async fn import_document(
    store: &dyn DeckStore,
    pipeline: &DocumentPipeline,
    user_id: &str,
    deck_id: Uuid,
    bytes: &[u8],
) -> Result<Vec<StoredFlashcard>, FlashcardError> {
    if bytes.is_empty() {
        return Err(FlashcardError::EmptyDocument);
    }
    store.get_deck(user_id, deck_id).await?;

    let cards = pipeline.process_document(bytes).await?;
    info!("Storing {} flashcards in deck {}", cards.len(), deck_id);
    store.insert_flashcards(user_id, deck_id, cards).await
}

/// Write `contents` to `path` atomically (temp file + rename).
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), FlashcardError> {
    let write_err = |source| FlashcardError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
