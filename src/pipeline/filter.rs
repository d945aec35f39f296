//! Chunk filtering: drop chunks that carry no flashcard-worthy content.
//!
//! The chunking model sometimes emits a section header on its own, or an
//! empty piece between two adjacent delimiters. Such chunks would only yield
//! meaningless flashcards, so they are flagged and discarded.
//!
//! A chunk is *approved* when, after removing markdown header lines
//! (`#`–`######`, space, text), anything other than whitespace and `#`
//! remains.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+[^\r\n]+\r?$").unwrap());

static RE_CONTENT_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^#\s]").unwrap());

/// Whether `chunk` has any non-header, non-whitespace content.
pub fn has_content(chunk: &str) -> bool {
    let without_headers = RE_HEADER_LINE.replace_all(chunk, "");
    RE_CONTENT_CHAR.is_match(&without_headers)
}

/// Partition chunks into `(approved, flagged)`, each in input order.
pub fn filter_chunks(chunks: Vec<String>) -> (Vec<String>, Vec<String>) {
    let (approved, flagged): (Vec<String>, Vec<String>) =
        chunks.into_iter().partition(|c| has_content(c));

    for chunk in &flagged {
        debug!("Flagged chunk without content: {:?}", chunk);
    }
    (approved, flagged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_is_flagged() {
        assert!(!has_content("# Header\n\n"));
        assert!(!has_content("## Section\n### Subsection\n"));
    }

    #[test]
    fn header_with_text_is_approved() {
        assert!(has_content("# Header\nSome text"));
    }

    #[test]
    fn whitespace_is_flagged() {
        assert!(!has_content(""));
        assert!(!has_content("  \n\t\n "));
    }

    #[test]
    fn bare_hashes_are_flagged() {
        assert!(!has_content("#\n##\n"));
    }

    #[test]
    fn seven_hashes_is_not_a_header() {
        assert!(has_content("####### too deep"));
    }

    #[test]
    fn header_pattern_does_not_span_lines() {
        // "#" followed by a newline is not a header, so "text" survives.
        assert!(has_content("#\ntext"));
    }

    #[test]
    fn crlf_header_is_flagged() {
        assert!(!has_content("# Title\r\n\r\n"));
    }

    #[test]
    fn partition_preserves_order() {
        let chunks = vec![
            "# A\n".to_string(),
            "first".to_string(),
            "   ".to_string(),
            "# B\nsecond".to_string(),
            "third".to_string(),
        ];
        let (approved, flagged) = filter_chunks(chunks);
        assert_eq!(approved, vec!["first", "# B\nsecond", "third"]);
        assert_eq!(flagged, vec!["# A\n", "   "]);
    }
}
