//! Boundary-preserving text chunker.
//!
//! Splits extracted document text into retrieval-sized segments that
//! respect a `max_chunk_size` limit measured in characters (Unicode scalar
//! values, not bytes).
//!
//! # Algorithm
//!
//! 1. Split text on blank-line boundaries (a newline, optional whitespace,
//!    another newline) into paragraphs.
//! 2. Greedily pack paragraphs into a buffer, separated by a single space.
//!    Before appending, flush the buffer if the result would exceed the
//!    limit.
//! 3. A paragraph longer than the limit is split into sentences (`.`, `!`
//!    or `?` followed by whitespace) which are packed under the same rule.
//! 4. A sentence longer than the limit flushes the buffer and is hard-split
//!    into slices of exactly `max_chunk_size` characters. This is the only
//!    place a chunk may break mid-word.
//! 5. Whatever remains in the buffer is flushed as the final chunk.
//!
//! Every emitted chunk is trimmed and non-empty. Empty or whitespace-only
//! input produces no chunks at all.
//!
//! # Example
//!
//! ```rust
//! use lexrag_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Paragraph one.\n\nParagraph two.", 100);
//! assert_eq!(chunks, vec!["Paragraph one. Paragraph two.".to_string()]);
//! ```

use crate::models::Chunk;

/// Split text into ordered chunks of at most `max_chunk_size` characters.
///
/// A `max_chunk_size` of zero is treated as one.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let max_chars = max_chunk_size.max(1);
    let mut packer = Packer::new(max_chars);

    for paragraph in split_paragraphs(text) {
        if paragraph.trim().is_empty() {
            continue;
        }

        let para_len = char_len(paragraph);
        packer.flush_if_overflow(para_len);

        if para_len <= max_chars {
            packer.append(paragraph, para_len);
            continue;
        }

        for sentence in split_sentences(paragraph) {
            if sentence.trim().is_empty() {
                continue;
            }
            let sentence_len = char_len(sentence);
            packer.flush_if_overflow(sentence_len);

            if sentence_len > max_chars {
                packer.flush();
                packer.hard_split(sentence);
            } else {
                packer.append(sentence, sentence_len);
            }
        }
    }

    packer.finish()
}

/// Chunk a document and attach its source id and 1-based ordinals.
pub fn chunk_document(source_id: &str, text: &str, max_chunk_size: usize) -> Vec<Chunk> {
    chunk_text(text, max_chunk_size)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            source_id: source_id.to_string(),
            ordinal: (i + 1) as u32,
            text,
        })
        .collect()
}

/// Running buffer plus the chunks flushed so far.
struct Packer {
    max_chars: usize,
    buffer: String,
    buffer_len: usize,
    chunks: Vec<String>,
}

impl Packer {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            buffer: String::new(),
            buffer_len: 0,
            chunks: Vec::new(),
        }
    }

    fn flush_if_overflow(&mut self, incoming_len: usize) {
        if self.buffer_len > 0 && self.buffer_len + incoming_len > self.max_chars {
            self.flush();
        }
    }

    fn append(&mut self, piece: &str, piece_len: usize) {
        self.buffer.push(' ');
        self.buffer.push_str(piece);
        self.buffer_len += 1 + piece_len;
    }

    fn flush(&mut self) {
        if self.buffer_len > 0 {
            let text = std::mem::take(&mut self.buffer);
            self.push_trimmed(&text);
            self.buffer_len = 0;
        }
    }

    /// Emit fixed-length slices of `max_chars` characters.
    fn hard_split(&mut self, sentence: &str) {
        let mut start = 0;
        let mut count = 0;
        for (idx, _) in sentence.char_indices() {
            if count == self.max_chars {
                self.push_trimmed(&sentence[start..idx]);
                start = idx;
                count = 0;
            }
            count += 1;
        }
        self.push_trimmed(&sentence[start..]);
    }

    fn push_trimmed(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on runs of whitespace that contain at least two newlines.
///
/// The separator spans from the first newline to the last newline of the
/// run; whitespace after the last newline stays with the next paragraph.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < text.len() {
        // '\n' is ASCII, so a byte match is always a char boundary.
        if text.as_bytes()[i] != b'\n' {
            i += 1;
            continue;
        }

        let mut last_newline = None;
        for (offset, c) in text[i + 1..].char_indices() {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                last_newline = Some(i + 1 + offset);
            }
        }

        match last_newline {
            Some(end) => {
                parts.push(&text[start..i]);
                start = end + 1;
                i = end + 1;
            }
            None => i += 1,
        }
    }

    parts.push(&text[start..]);
    parts
}

/// Split after `.`, `!` or `?` wherever whitespace follows, dropping the
/// whitespace run.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            sentences.push(&paragraph[start..idx]);
            let mut end = idx + c.len_utf8();
            while let Some(&(next_idx, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                end = next_idx + next.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    sentences.push(&paragraph[start..]);
    sentences
}
