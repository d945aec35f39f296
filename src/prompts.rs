//! Prompts for semantic chunking, flashcard generation and page transcription.
//!
//! Every instruction the crate sends to a model lives here, so prompt wording
//! can change without touching call, retry or parsing logic, and unit tests
//! can inspect prompts without a live model.

/// Literal the chunking model inserts between semantically distinct sections.
pub const CHUNK_BREAK: &str = "<CHUNK_BREAK>";

/// Build the semantic-splitting instruction for one block of text.
///
/// The model must echo the block verbatim with [`CHUNK_BREAK`] inserted at
/// topic boundaries; the reply is split on that literal and nothing else.
pub fn chunking_prompt(block_text: &str) -> String {
    format!(
        "Split the markdown text into semantically coherent sections. These sections should have a clear start and end, \
focusing on a single topic. These chunks MUST contain all of the text related to the topic and can span multiple lines. \
Each chunk needs to include some meaningful content and should NEVER just be a section header. \
When the topic changes, the chunk changes as well.\n\n\
Footnotes or a footer should not be misinterpreted as a topic change. Do not use them to justify a chunk change.\n\n\
A corresponding question/answer pair should be included in the same chunk. Different question/answer pairs \
should be chunked separately, as they are semantically different.\n\n\
Create these \"chunks\" by adding \"{CHUNK_BREAK}\" (no spaces) into the text as a chunk delimiter. \
Do not change anything else in the provided text. Do not remove the <page_number> delimiter.\n\n\
If you see a new line in text, keep the \\n character. Do not change a single character of the provided text.\n\n\
Provided text: {block_text}"
    )
}

/// Build the flashcard instruction for one approved chunk.
///
/// The reply must consist of exactly a `Question:` line followed by an
/// `Answer:` line; see [`crate::pipeline::flashcard::parse_flashcard`].
pub fn flashcard_prompt(chunk: &str) -> String {
    format!(
        "Based on the following text chunk, create a flashcard with a question and answer. \
The flashcard should capture the main ideas of the text. \
Format your response exactly as follows, without any additional commentary:\n\n\
Question: <Your question here>\n\
Answer: <Your answer here>\n\n\
Text chunk: {chunk}"
    )
}

/// System prompt for transcribing a rasterised PDF page to Markdown
/// ([`crate::config::PdfMode::Vision`]).
pub const PAGE_TRANSCRIPTION_PROMPT: &str = r#"You are an expert document converter. Your task is to convert a PDF page image to clean, well-structured Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text content completely and accurately
   - Maintain the reading order as a human would read the page

2. STRUCTURE
   - Use # for the main page title (at most one per page)
   - Use ## for major sections, ### for subsections, #### for minor headings
   - Use - for unordered lists and 1. 2. 3. for ordered lists
   - Convert tables to GFM pipe format

3. WHAT TO IGNORE
   - Repeated headers/footers that appear on every page
   - Decorative borders and lines that carry no content meaning

4. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary or explanations
   - Start directly with the page content"#;
