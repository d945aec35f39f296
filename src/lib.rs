//! # edgequake-flashcards
//!
//! Turn study documents (PDF or Markdown) into question/answer flashcards
//! with an LLM.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document bytes
//!  │
//!  ├─ 1. Parse     bytes → ordered pages (Markdown, PDF text layer, or VLM transcription)
//!  ├─ 2. Batch     pages → blocks of at most `max_block_tokens` tokens
//!  ├─ 3. Chunk     one LLM call per block, concurrently; split on <CHUNK_BREAK>
//!  ├─ 4. Filter    drop chunks that hold only Markdown headers or whitespace
//!  └─ 5. Generate  one LLM call per approved chunk, concurrently, order kept
//! ```
//!
//! A run is all-or-nothing: the first failing block or chunk aborts the
//! document and [`FlashcardError::stage`] tells which stage broke.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_flashcards::{process_document, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER
//!     let config = PipelineConfig::default();
//!     let bytes = std::fs::read("lecture.pdf")?;
//!     for card in process_document(&bytes, &config).await? {
//!         println!("Q: {}\nA: {}\n", card.question, card.answer);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2cards` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-flashcards = { version = "0.1", default-features = false }
//! ```
//!
//! ## Testing without a provider
//!
//! [`DocumentPipeline::new`] takes its parser, token counter and completion
//! model as trait objects, so every stage can be driven by in-memory fakes.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod deck;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod tokens;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PdfMode, PipelineConfig, PipelineConfigBuilder};
pub use convert::{import_document, process_document, DocumentPipeline};
pub use deck::{
    Deck, DeckStore, DeckUpdate, JsonFileDeckStore, MemoryDeckStore, NewDeck, StoredFlashcard,
};
pub use error::{FlashcardError, ModelError, Stage};
pub use model::{Completion, CompletionModel, ProviderModel};
pub use output::{Flashcard, PipelineOutput, PipelineStats};
pub use pipeline::parse::{AutoParser, DocumentParser, MarkdownParser, Page};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use tokens::{count_tokens, TiktokenCounter, TokenCounter};
