//! Error types for the edgequake-flashcards library.
//!
//! Two error types reflect two layers of failure:
//!
//! * [`FlashcardError`]: **Fatal**: the document cannot be turned into
//!   flashcards (unreadable input, a block that could not be chunked, a
//!   model reply in the wrong shape, a deck the user does not own). Every
//!   public entry point returns `Err(FlashcardError)`.
//!
//! * [`ModelError`]: the cause reported by a single completion call
//!   (timeout, provider/API error). It never escapes on its own; the
//!   pipeline wraps it into the stage failure that owns the call, so the
//!   caller always learns *which* block or chunk broke.
//!
//! Pipeline failures are all-or-nothing: one failed block or chunk aborts the
//! whole document and no flashcards are returned. [`FlashcardError::stage`]
//! names the stage that failed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The sequential stages of the document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Raw bytes → ordered pages.
    Parse,
    /// Pages → token-bounded blocks.
    Batch,
    /// Blocks → semantically coherent chunks (one model call per block).
    Chunk,
    /// Chunks → approved / flagged partitions.
    Filter,
    /// Approved chunks → flashcards (one model call per chunk).
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Batch => "batch",
            Stage::Chunk => "chunk",
            Stage::Filter => "filter",
            Stage::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// All fatal errors returned by the edgequake-flashcards library.
#[derive(Debug, Error)]
pub enum FlashcardError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but could not be read (directory, I/O error, …).
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The uploaded document has no bytes at all.
    #[error("Document is empty")]
    EmptyDocument,

    // ── Pipeline stage errors ─────────────────────────────────────────────
    /// The document parser rejected the input or found no content.
    #[error("[parse] Document could not be parsed: {detail}")]
    Parse { detail: String },

    /// The tokenizer registry does not know the configured model.
    #[error("[batch] Unknown tokenizer model '{model}': {detail}")]
    Tokenization { model: String, detail: String },

    /// The semantic-split call for one block failed.
    #[error("[chunk] Chunking block {block} failed: {source}")]
    Chunking {
        block: usize,
        #[source]
        source: ModelError,
    },

    /// A flashcard reply did not contain the `Question:` / `Answer:` fields.
    #[error(
        "[generate] Flashcard reply for chunk {chunk} is not in the expected format. \
Expected 'Question:' and 'Answer:' markers, got: {reply:?}"
    )]
    FlashcardFormat { chunk: usize, reply: String },

    /// The flashcard call for one chunk failed before a reply arrived.
    #[error("[generate] Flashcard generation for chunk {chunk} failed: {source}")]
    Generation {
        chunk: usize,
        #[source]
        source: ModelError,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The deck does not exist or belongs to another user.
    #[error("Deck '{deck_id}' not found or not owned by user")]
    DeckNotFound { deck_id: String },

    /// Deck fields failed validation (e.g. an empty name).
    #[error("Invalid deck: {0}")]
    InvalidDeck(String),

    /// The deck store could not be read or written.
    #[error("Deck storage error: {0}")]
    Storage(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlashcardError {
    /// The pipeline stage this failure belongs to, if any.
    ///
    /// Input, provider, storage and configuration errors happen outside the
    /// staged pipeline and return `None`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            FlashcardError::EmptyDocument | FlashcardError::Parse { .. } => Some(Stage::Parse),
            FlashcardError::Tokenization { .. } => Some(Stage::Batch),
            FlashcardError::Chunking { .. } => Some(Stage::Chunk),
            FlashcardError::FlashcardFormat { .. } | FlashcardError::Generation { .. } => {
                Some(Stage::Generate)
            }
            _ => None,
        }
    }
}

/// Failure of a single completion call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ModelError {
    /// The call did not finish within the per-call timeout.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider returned an error (after any transport retries).
    #[error("model API error: {message}")]
    Api { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_display_names_block_and_cause() {
        let e = FlashcardError::Chunking {
            block: 3,
            source: ModelError::Api {
                message: "503 overloaded".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("block 3"), "got: {msg}");
        assert!(msg.contains("503 overloaded"), "got: {msg}");
        assert!(msg.starts_with("[chunk]"));
    }

    #[test]
    fn format_error_names_chunk() {
        let e = FlashcardError::FlashcardFormat {
            chunk: 7,
            reply: "Q: nope".into(),
        };
        assert!(e.to_string().contains("chunk 7"));
        assert_eq!(e.stage(), Some(Stage::Generate));
    }

    #[test]
    fn stage_mapping() {
        assert_eq!(
            FlashcardError::Parse { detail: "x".into() }.stage(),
            Some(Stage::Parse)
        );
        assert_eq!(FlashcardError::EmptyDocument.stage(), Some(Stage::Parse));
        assert_eq!(
            FlashcardError::Tokenization {
                model: "nope".into(),
                detail: "unknown".into()
            }
            .stage(),
            Some(Stage::Batch)
        );
        assert_eq!(
            FlashcardError::Generation {
                chunk: 0,
                source: ModelError::Timeout { secs: 60 }
            }
            .stage(),
            Some(Stage::Generate)
        );
        assert_eq!(
            FlashcardError::DeckNotFound {
                deck_id: "d".into()
            }
            .stage(),
            None
        );
    }

    #[test]
    fn invalid_deck_is_not_a_config_error() {
        let e = FlashcardError::InvalidDeck("deck name must not be empty".into());
        assert_eq!(e.to_string(), "Invalid deck: deck name must not be empty");
        assert_eq!(e.stage(), None);
    }

    #[test]
    fn timeout_display() {
        let e = ModelError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Generate.to_string(), "generate");
        assert_eq!(Stage::Chunk.to_string(), "chunk");
    }
}
