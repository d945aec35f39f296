//! Semantic chunking: split each block at topic boundaries via the model.
//!
//! One completion call per block. The model echoes the block with
//! [`CHUNK_BREAK`] inserted between sections and the reply is split on that
//! literal. Calls run concurrently (bounded by `concurrency`) and finish in
//! any order; [`chunk_blocks`] sorts the results by block index before
//! flattening, so the chunk sequence depends only on block order.
//!
//! A failed call fails the whole stage. Sibling calls still in flight are
//! dropped and nothing partial is returned.

use crate::error::FlashcardError;
use crate::model::CompletionModel;
use crate::pipeline::Usage;
use crate::progress::ProgressCallback;
use crate::prompts::{chunking_prompt, CHUNK_BREAK};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// The chunks produced for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedBlock {
    pub block_index: usize,
    pub chunks: Vec<String>,
    pub usage: Usage,
}

/// Split a chunking reply on [`CHUNK_BREAK`]. No trimming is applied.
pub fn split_chunks(reply: &str) -> Vec<String> {
    reply.split(CHUNK_BREAK).map(str::to_string).collect()
}

/// Ask the model to split one block.
///
/// # Errors
/// [`FlashcardError::Chunking`] carrying `block_index` and the model error.
pub async fn request_chunks(
    model: &dyn CompletionModel,
    block_index: usize,
    block_text: &str,
) -> Result<ChunkedBlock, FlashcardError> {
    let completion = model
        .complete(&chunking_prompt(block_text))
        .await
        .map_err(|source| FlashcardError::Chunking {
            block: block_index,
            source,
        })?;

    let chunks = split_chunks(&completion.content);
    debug!("Block {}: split into {} chunks", block_index, chunks.len());

    let mut usage = Usage::default();
    usage.record(&completion);

    Ok(ChunkedBlock {
        block_index,
        chunks,
        usage,
    })
}

/// Chunks for a whole document, in global order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingOutcome {
    pub chunks: Vec<String>,
    pub usage: Usage,
}

/// Chunk every block concurrently and reassemble in block order.
pub async fn chunk_blocks(
    model: &dyn CompletionModel,
    blocks: &[String],
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> Result<ChunkingOutcome, FlashcardError> {
    let total_blocks = blocks.len();
    info!(
        "Chunking {} blocks ({} concurrent)",
        total_blocks, concurrency
    );

    let mut results: Vec<ChunkedBlock> =
        stream::iter(blocks.iter().enumerate().map(|(i, block)| async move {
            let chunked = request_chunks(model, i, block).await?;
            if let Some(cb) = progress {
                cb.on_block_chunked(i, total_blocks, chunked.chunks.len());
            }
            Ok::<_, FlashcardError>(chunked)
        }))
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    results.sort_by_key(|r| r.block_index);

    let mut outcome = ChunkingOutcome::default();
    for result in results {
        outcome.usage.merge(result.usage);
        outcome.chunks.extend(result.chunks);
    }

    info!(
        "Chunked {} blocks into {} chunks",
        total_blocks,
        outcome.chunks.len()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::Completion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracks how many calls are in flight at once.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionModel for Gauge {
        async fn complete(&self, _prompt: &str) -> Result<Completion, ModelError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Completion::text("piece"))
        }
    }

    /// Echoes the block back, inserting a break after every "|". Blocks
    /// containing "slow" are delayed; blocks containing "boom" fail.
    struct EchoSplitter;

    #[async_trait]
    impl CompletionModel for EchoSplitter {
        async fn complete(&self, prompt: &str) -> Result<Completion, ModelError> {
            let block = prompt
                .rsplit_once("Provided text: ")
                .map(|(_, b)| b)
                .unwrap_or_default();
            if block.contains("boom") {
                return Err(ModelError::Api {
                    message: "boom".into(),
                });
            }
            if block.contains("slow") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(Completion {
                content: block.replace('|', CHUNK_BREAK),
                prompt_tokens: 10,
                completion_tokens: 5,
            })
        }
    }

    #[test]
    fn split_keeps_text_verbatim() {
        let chunks = split_chunks("Intro content<CHUNK_BREAK>Details content");
        assert_eq!(chunks, vec!["Intro content", "Details content"]);
    }

    #[test]
    fn split_without_delimiter_is_one_chunk() {
        assert_eq!(split_chunks(" whole block \n"), vec![" whole block \n"]);
    }

    #[test]
    fn split_keeps_empty_pieces() {
        let chunks = split_chunks("a<CHUNK_BREAK><CHUNK_BREAK>b<CHUNK_BREAK>");
        assert_eq!(chunks, vec!["a", "", "b", ""]);
    }

    #[tokio::test]
    async fn request_chunks_tags_block_index() {
        let chunked = request_chunks(&EchoSplitter, 4, "x|y").await.unwrap();
        assert_eq!(chunked.block_index, 4);
        assert_eq!(chunked.chunks, vec!["x", "y"]);
        assert_eq!(chunked.usage.calls, 1);
    }

    #[tokio::test]
    async fn out_of_order_completion_keeps_block_order() {
        // Block 0 finishes last.
        let blocks = vec!["slow A|slow B".to_string(), "C|D".to_string()];
        let outcome = chunk_blocks(&EchoSplitter, &blocks, 4, None).await.unwrap();
        assert_eq!(outcome.chunks, vec!["slow A", "slow B", "C", "D"]);
        assert_eq!(outcome.usage.calls, 2);
        assert_eq!(outcome.usage.prompt_tokens, 20);
    }

    #[tokio::test]
    async fn one_failed_block_fails_the_stage() {
        let blocks = vec!["a|b".to_string(), "boom".to_string(), "c".to_string()];
        let err = chunk_blocks(&EchoSplitter, &blocks, 2, None).await.unwrap_err();
        match err {
            FlashcardError::Chunking { block, source } => {
                assert_eq!(block, 1);
                assert_eq!(source, ModelError::Api { message: "boom".into() });
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_blocks_no_calls() {
        let outcome = chunk_blocks(&EchoSplitter, &[], 3, None).await.unwrap();
        assert!(outcome.chunks.is_empty());
        assert_eq!(outcome.usage.calls, 0);
    }

    #[tokio::test]
    async fn in_flight_calls_never_exceed_concurrency() {
        let gauge = Gauge::default();
        let blocks: Vec<String> = (0..12).map(|i| format!("block {i}")).collect();

        let outcome = chunk_blocks(&gauge, &blocks, 3, None).await.unwrap();

        assert_eq!(outcome.chunks.len(), 12);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak {peak} exceeded concurrency 3");
        assert!(peak > 1, "blocks were never chunked concurrently");
    }
}
