//! Result types returned by the pipeline.

use serde::{Deserialize, Serialize};

/// A question/answer pair generated from one approved chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Flashcards in global chunk order.
    pub flashcards: Vec<Flashcard>,
    /// Chunks dropped by the filter (headers or whitespace only), in order.
    pub flagged_chunks: Vec<String>,
    pub stats: PipelineStats,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub pages: usize,
    pub blocks: usize,
    pub chunks: usize,
    pub approved_chunks: usize,
    pub flagged_chunks: usize,
    /// Successful completion calls across chunking and generation.
    pub model_calls: usize,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub parse_duration_ms: u64,
    pub chunk_duration_ms: u64,
    pub generate_duration_ms: u64,
    pub total_duration_ms: u64,
}
