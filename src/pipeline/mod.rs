//! Pipeline stages for document-to-flashcard conversion.
//!
//! Each submodule implements exactly one transformation step so every stage
//! can be tested on its own with substituted collaborators.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ parse ──▶ batch ──▶ chunk ──▶ filter ──▶ flashcard
//! (bytes)   (pages)   (blocks)  (LLM)     (regex)    (LLM)
//! ```
//!
//! 1. [`input`]    : read a local file or download a URL into memory
//! 2. [`parse`]    : turn raw bytes into ordered page texts; the PDF vision
//!    path uses [`render`], [`encode`] and [`postprocess`]
//! 3. [`batch`]    : merge pages into token-bounded blocks
//! 4. [`chunk`]    : concurrent semantic splitting, reassembled in block order
//! 5. [`filter`]   : drop header-only and blank chunks
//! 6. [`flashcard`]: concurrent flashcard generation, returned in chunk order

pub mod batch;
pub mod chunk;
pub mod encode;
pub mod filter;
pub mod flashcard;
pub mod input;
pub mod parse;
pub mod postprocess;
pub mod render;

use crate::model::Completion;

/// Model usage accumulated over one fan-out stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub calls: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn record(&mut self, completion: &Completion) {
        self.calls += 1;
        self.prompt_tokens += completion.prompt_tokens as u64;
        self.completion_tokens += completion.completion_tokens as u64;
    }

    pub fn merge(&mut self, other: Usage) {
        self.calls += other.calls;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}
