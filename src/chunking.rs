//! Document chunking strategies.
//!
//! Two interchangeable splitters feed the ingestion path:
//!
//! * [`split_by_blank_line`] — paragraph-sized chunks separated by blank
//!   lines, the default for plain-text documents.
//! * [`split_by_sentence`] — sentence-accumulating chunks bounded by a
//!   character budget, for prose without paragraph structure.
//!
//! Both are eager and order-preserving; feeding the same input twice yields
//! identical output.

use std::path::Path;

use tokio::fs;

use crate::types::RagError;

/// Sentence terminator used when no delimiter is supplied (full-width
/// period, the common case for Chinese prose).
pub const DEFAULT_SENTENCE_DELIMITER: char = '。';

/// Reads a UTF-8 document and splits it into paragraph chunks.
///
/// An unreadable path surfaces as [`RagError::Io`]; an empty or
/// whitespace-only file yields an empty vec, not an error.
pub async fn split_file_by_blank_line(path: impl AsRef<Path>) -> Result<Vec<String>, RagError> {
    let content = fs::read_to_string(path.as_ref()).await?;
    Ok(split_by_blank_line(&content))
}

/// Splits text on blank-line boundaries, trimming each chunk and dropping
/// empty results.
pub fn split_by_blank_line(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits text into sentence-accumulated chunks using the default delimiter.
///
/// See [`split_by_sentence_with`] for the accumulation rules.
pub fn split_by_sentence(text: &str, max_chars: usize) -> Vec<String> {
    split_by_sentence_with(text, max_chars, DEFAULT_SENTENCE_DELIMITER)
}

/// Splits `text` on `delimiter` and greedily packs sentences into chunks of
/// at most `max_chars` characters.
///
/// A chunk is flushed when appending the next sentence (plus its terminal
/// delimiter) would exceed the budget; that sentence then starts a new
/// chunk. A single sentence longer than `max_chars` is emitted whole —
/// the budget bounds accumulation, it never truncates mid-sentence.
pub fn split_by_sentence_with(text: &str, max_chars: usize, delimiter: char) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in text.split(delimiter).filter(|s| !s.is_empty()) {
        let sentence_chars = sentence.chars().count() + 1;
        if current_chars + sentence_chars <= max_chars {
            current.push_str(sentence);
            current.push(delimiter);
            current_chars += sentence_chars;
        } else {
            if !current.is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = format!("{sentence}{delimiter}");
            current_chars = sentence_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks.retain(|chunk| !chunk.is_empty());
    chunks
}
