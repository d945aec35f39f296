//! Token counting for block sizing.
//!
//! Blocks are sized in the same BPE units the completion model bills and
//! truncates in, so the counter is resolved from a named model family via
//! tiktoken. Tests substitute cheaper counters through [`TokenCounter`].

use crate::error::FlashcardError;
use tiktoken_rs::CoreBPE;

/// Counts tokens in a text. Deterministic and side-effect free.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// [`TokenCounter`] backed by the tiktoken encoding of a model family.
pub struct TiktokenCounter {
    model: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load the encoding for `model` (e.g. "gpt-3.5-turbo", "gpt-4o").
    ///
    /// # Errors
    /// [`FlashcardError::Tokenization`] when tiktoken does not know the model.
    pub fn for_model(model: &str) -> Result<Self, FlashcardError> {
        let bpe =
            tiktoken_rs::get_bpe_from_model(model).map_err(|e| FlashcardError::Tokenization {
                model: model.to_string(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Count the tokens of `text` for the tokenizer of `model`.
///
/// Loads the encoding on every call; hold a [`TiktokenCounter`] when
/// counting repeatedly.
pub fn count_tokens(text: &str, model: &str) -> Result<usize, FlashcardError> {
    Ok(TiktokenCounter::for_model(model)?.count(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_deterministic() {
        let counter = TiktokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let text = "The mitochondria is the powerhouse of the cell.";
        let n = counter.count(text);
        assert!(n > 0);
        assert_eq!(n, counter.count(text));
        assert_eq!(counter.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(count_tokens("", "gpt-3.5-turbo").unwrap(), 0);
    }

    #[test]
    fn longer_text_has_more_tokens() {
        let short = count_tokens("hello", "gpt-4o").unwrap();
        let long = count_tokens("hello hello hello hello hello", "gpt-4o").unwrap();
        assert!(long > short);
    }

    #[test]
    fn unknown_model_is_a_tokenization_error() {
        let err = count_tokens("hello", "definitely-not-a-model").unwrap_err();
        assert!(matches!(err, FlashcardError::Tokenization { ref model, .. } if model == "definitely-not-a-model"));
    }
}
