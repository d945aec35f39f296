//! Flashcard generation: one model call per approved chunk.
//!
//! Model output is untrusted text. The reply must contain a `Question:`
//! marker followed by an `Answer:` marker; anything else is a
//! [`FlashcardError::FlashcardFormat`] naming the chunk. Format failures are
//! not retried.
//!
//! [`generate_flashcards`] runs the calls concurrently but yields results in
//! input order: card *i* always comes from approved chunk *i*. One failure
//! fails the batch and no partial list is returned.

use crate::error::FlashcardError;
use crate::model::CompletionModel;
use crate::output::Flashcard;
use crate::pipeline::Usage;
use crate::progress::ProgressCallback;
use crate::prompts::flashcard_prompt;
use futures::stream::{self, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static RE_QUESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Question:\s*(.*?)\s*Answer:").unwrap());

static RE_ANSWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)Answer:\s*(.*)").unwrap());

/// Extract the `(question, answer)` pair from a model reply.
///
/// The question is the text between `Question:` and the following `Answer:`;
/// the answer is everything after `Answer:`. Both may span lines and are
/// trimmed. Returns `None` when a marker is missing or a field is empty.
pub fn parse_flashcard(reply: &str) -> Option<Flashcard> {
    let question = RE_QUESTION.captures(reply)?.get(1)?.as_str().trim();
    let answer = RE_ANSWER.captures(reply)?.get(1)?.as_str().trim();

    if question.is_empty() || answer.is_empty() {
        return None;
    }
    Some(Flashcard::new(question, answer))
}

/// Generate the flashcard for one chunk.
///
/// `chunk_index` is used only to attribute errors.
pub async fn generate_flashcard(
    model: &dyn CompletionModel,
    chunk_index: usize,
    chunk: &str,
) -> Result<(Flashcard, Usage), FlashcardError> {
    let completion = model
        .complete(&flashcard_prompt(chunk))
        .await
        .map_err(|source| FlashcardError::Generation {
            chunk: chunk_index,
            source,
        })?;

    let card = parse_flashcard(&completion.content).ok_or_else(|| {
        FlashcardError::FlashcardFormat {
            chunk: chunk_index,
            reply: completion.content.clone(),
        }
    })?;
    debug!("Chunk {}: flashcard {:?}", chunk_index, card.question);

    let mut usage = Usage::default();
    usage.record(&completion);
    Ok((card, usage))
}

/// Flashcards for a whole document, in approved-chunk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub flashcards: Vec<Flashcard>,
    pub usage: Usage,
}

/// Generate one flashcard per chunk, concurrently, preserving input order.
pub async fn generate_flashcards(
    model: &dyn CompletionModel,
    chunks: &[String],
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> Result<GenerationOutcome, FlashcardError> {
    let total = chunks.len();
    info!("Generating {} flashcards ({} concurrent)", total, concurrency);

    let results: Vec<(Flashcard, Usage)> =
        stream::iter(chunks.iter().enumerate().map(|(i, chunk)| async move {
            let generated = generate_flashcard(model, i, chunk).await?;
            if let Some(cb) = progress {
                cb.on_flashcard_generated(i, total);
            }
            Ok::<_, FlashcardError>(generated)
        }))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut outcome = GenerationOutcome::default();
    for (card, usage) in results {
        outcome.usage.merge(usage);
        outcome.flashcards.push(card);
    }
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
            Ok(Completion::text("Question: q?\nAnswer: a."))
        }
    }

    /// Turns "Text chunk: <n>" into a card about <n>. Chunk "late" is
    /// delayed, chunk "bad" gets a malformed reply, chunk "down" errors.
    struct CardWriter;

    #[async_trait]
    impl CompletionModel for CardWriter {
        async fn complete(&self, prompt: &str) -> Result<Completion, ModelError> {
            let chunk = prompt
                .rsplit_once("Text chunk: ")
                .map(|(_, c)| c)
                .unwrap_or_default();
            match chunk {
                "bad" => Ok(Completion::text("Sure! Here is a flashcard about it.")),
                "down" => Err(ModelError::Timeout { secs: 60 }),
                "late" => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Completion::text("Question: late?\nAnswer: late."))
                }
                other => Ok(Completion::text(format!(
                    "Question: What is {other}?\nAnswer: {other} is a chunk."
                ))),
            }
        }
    }

    fn chunks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_well_formed_reply() {
        let card = parse_flashcard("Question: What is X?\nAnswer: X is Y.").unwrap();
        assert_eq!(card, Flashcard::new("What is X?", "X is Y."));
    }

    #[test]
    fn missing_answer_marker_fails() {
        assert!(parse_flashcard("Question: What is X?\nX is Y.").is_none());
    }

    #[test]
    fn missing_question_marker_fails() {
        assert!(parse_flashcard("What is X?\nAnswer: X is Y.").is_none());
    }

    #[test]
    fn multiline_fields_are_kept_and_trimmed() {
        let reply = "  Question:  Name the\nthree states of matter.\n\nAnswer:\n- solid\n- liquid\n- gas\n\n";
        let card = parse_flashcard(reply).unwrap();
        assert_eq!(card.question, "Name the\nthree states of matter.");
        assert_eq!(card.answer, "- solid\n- liquid\n- gas");
    }

    #[test]
    fn empty_fields_fail() {
        assert!(parse_flashcard("Question:\nAnswer: something").is_none());
        assert!(parse_flashcard("Question: something\nAnswer:   \n").is_none());
    }

    #[tokio::test]
    async fn format_error_names_chunk() {
        let err = generate_flashcard(&CardWriter, 5, "bad").await.unwrap_err();
        assert!(matches!(err, FlashcardError::FlashcardFormat { chunk: 5, .. }));
    }

    #[tokio::test]
    async fn model_error_becomes_generation_error() {
        let err = generate_flashcard(&CardWriter, 2, "down").await.unwrap_err();
        assert!(matches!(
            err,
            FlashcardError::Generation {
                chunk: 2,
                source: ModelError::Timeout { secs: 60 }
            }
        ));
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let input = chunks(&["late", "b", "c"]);
        let outcome = generate_flashcards(&CardWriter, &input, 3, None).await.unwrap();
        let questions: Vec<&str> = outcome
            .flashcards
            .iter()
            .map(|c| c.question.as_str())
            .collect();
        assert_eq!(questions, vec!["late?", "What is b?", "What is c?"]);
        assert_eq!(outcome.usage.calls, 3);
    }

    #[tokio::test]
    async fn one_failure_fails_whole_batch() {
        let input = chunks(&["a", "bad", "c"]);
        let err = generate_flashcards(&CardWriter, &input, 3, None).await.unwrap_err();
        assert!(matches!(err, FlashcardError::FlashcardFormat { chunk: 1, .. }));
    }

    #[tokio::test]
    async fn in_flight_calls_never_exceed_concurrency() {
        let gauge = Gauge::default();
        let input: Vec<String> = (0..12).map(|i| format!("chunk {i}")).collect();

        let outcome = generate_flashcards(&gauge, &input, 2, None).await.unwrap();

        assert_eq!(outcome.flashcards.len(), 12);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak {peak} exceeded concurrency 2");
        assert!(peak > 1, "chunks were never processed concurrently");
    }
}
