//! Block batching: merge ordered pages into token-bounded blocks.
//!
//! Each block becomes one semantic-chunking request, so blocks should be as
//! large as the budget allows to keep the number of model calls low. Pages
//! are never split. A page that alone exceeds the budget is passed through as
//! its own oversized block rather than rejected.

use crate::pipeline::parse::Page;
use crate::tokens::TokenCounter;
use tracing::{debug, warn};

/// Merge `pages` into blocks of at most `max_tokens` tokens, preserving order.
///
/// Concatenating the returned blocks yields exactly the concatenation of the
/// page texts. `blocks.len() <= pages.len()`.
pub fn batch_pages(pages: &[Page], counter: &dyn TokenCounter, max_tokens: usize) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut pending = String::new();
    let mut pending_tokens = 0usize;

    for page in pages {
        let page_tokens = counter.count(&page.text);

        if pending_tokens + page_tokens <= max_tokens {
            pending.push_str(&page.text);
            pending_tokens = counter.count(&pending);
            continue;
        }

        if !pending.is_empty() {
            blocks.push(std::mem::take(&mut pending));
        }

        if page_tokens > max_tokens {
            warn!(
                "Page {} has {} tokens, over the {} token block budget; keeping it as its own block",
                page.index + 1,
                page_tokens,
                max_tokens
            );
        }
        pending.push_str(&page.text);
        pending_tokens = page_tokens;
    }

    if !pending.is_empty() {
        blocks.push(pending);
    }

    debug!("Batched {} pages into {} blocks", pages.len(), blocks.len());
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn pages(texts: &[&str]) -> Vec<Page> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Page::new(i, *t))
            .collect()
    }

    #[test]
    fn small_pages_merge_into_one_block() {
        let p = pages(&["one two ", "three four "]);
        let blocks = batch_pages(&p, &WordCounter, 10);
        assert_eq!(blocks, vec!["one two three four ".to_string()]);
    }

    #[test]
    fn budget_overflow_seals_block() {
        let p = pages(&["a b c ", "d e f ", "g h "]);
        let blocks = batch_pages(&p, &WordCounter, 5);
        assert_eq!(blocks, vec!["a b c ", "d e f g h "]);
    }

    #[test]
    fn exact_budget_fits() {
        let p = pages(&["a b ", "c d "]);
        let blocks = batch_pages(&p, &WordCounter, 4);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn oversized_page_passes_through_alone() {
        let p = pages(&["a ", "b c d e f g ", "h "]);
        let blocks = batch_pages(&p, &WordCounter, 3);
        assert_eq!(blocks, vec!["a ", "b c d e f g ", "h "]);
    }

    #[test]
    fn oversized_first_page() {
        let p = pages(&["a b c d e ", "f "]);
        let blocks = batch_pages(&p, &WordCounter, 2);
        assert_eq!(blocks, vec!["a b c d e ", "f "]);
    }

    #[test]
    fn no_page_dropped_or_duplicated() {
        let texts: Vec<String> = (0..37)
            .map(|i| "w ".repeat(i % 7 + 1) + &format!("p{i}\n"))
            .collect();
        let p: Vec<Page> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Page::new(i, t.clone()))
            .collect();

        for budget in [1, 3, 8, 20, 1000] {
            let blocks = batch_pages(&p, &WordCounter, budget);
            assert_eq!(blocks.concat(), texts.concat(), "budget {budget}");
            assert!(blocks.len() <= p.len());
            for block in &blocks {
                let tokens = WordCounter.count(block);
                let single_page = texts.iter().any(|t| t == block);
                assert!(
                    tokens <= budget || single_page,
                    "block over budget {budget}: {block:?}"
                );
            }
        }
    }

    #[test]
    fn empty_input_yields_no_blocks() {
        assert!(batch_pages(&[], &WordCounter, 10).is_empty());
        assert!(batch_pages(&pages(&["", ""]), &WordCounter, 10).is_empty());
    }
}
