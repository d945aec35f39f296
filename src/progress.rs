//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline chunks blocks and generates flashcards.
//!
//! # Example
//!
//! ```rust
//! use edgequake_flashcards::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     cards: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_flashcard_generated(&self, chunk: usize, total: usize) {
//!         let done = self.cards.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("chunk {chunk}: {done}/{total} flashcards");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { cards: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the pipeline as it processes a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_block_chunked` and `on_flashcard_generated` fire from concurrent
/// tasks in completion order, not input order. Implementations must protect
/// shared mutable state with `Mutex`, atomics or similar.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once after parsing, before batching.
    fn on_pipeline_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a block's chunking call returns.
    ///
    /// # Arguments
    /// * `block`       : 0-indexed block position
    /// * `total_blocks`: number of blocks in the document
    /// * `chunk_count` : chunks the block was split into
    fn on_block_chunked(&self, block: usize, total_blocks: usize, chunk_count: usize) {
        let _ = (block, total_blocks, chunk_count);
    }

    /// Called when a flashcard has been generated and parsed for a chunk.
    ///
    /// # Arguments
    /// * `chunk`: 0-indexed position in the approved-chunk list
    /// * `total`: number of approved chunks
    fn on_flashcard_generated(&self, chunk: usize, total: usize) {
        let _ = (chunk, total);
    }

    /// Called once after the last stage succeeded.
    fn on_pipeline_complete(&self, flashcards: usize) {
        let _ = flashcards;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
