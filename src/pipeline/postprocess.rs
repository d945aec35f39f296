//! Post-processing: deterministic cleanup of vision-transcribed page Markdown.
//!
//! Vision models occasionally wrap their output in a ```` ```markdown ````
//! fence, emit CRLF line endings, pad lines with trailing spaces or sprinkle
//! zero-width characters. Those artefacts would be echoed through chunking
//! and into flashcards, so each page is normalised before batching.
//!
//! Rules run in this order: strip fences, normalise line endings, trim
//! trailing whitespace, collapse blank lines, strip invisible characters,
//! end with exactly one newline. The final newline keeps consecutive pages
//! from running together when blocks concatenate them.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page of transcribed Markdown.
pub fn clean_page_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

/// Zero-width spaces/joiners, word joiner, BOM and soft hyphen.
fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}
