//! Boundary-preferring text chunker.
//!
//! Splits document content into chunks of at most `chunk_size` characters
//! with up to `chunk_overlap` characters shared between consecutive chunks.
//! Split points prefer, in descending priority: paragraph break (`\n\n`),
//! line break, sentence end (`. `), word gap, then a hard cut at the size
//! limit. Each chunk inherits its parent document's metadata unchanged.
//!
//! Prebuilt corpora bypass this module entirely; their input is already
//! chunk-granular.

use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Split documents into chunks. One document yields zero or more chunks;
/// an empty or whitespace-only document yields none.
pub fn split_documents(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        for text in split_text(&doc.content, chunk_size, chunk_overlap) {
            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                text,
                metadata: doc.metadata.clone(),
            });
        }
    }
    chunks
}

/// Split a single text into overlapping pieces of at most `chunk_size` chars.
///
/// `chunk_overlap` must be strictly less than `chunk_size`; config
/// validation enforces this before the chunker runs. Overlap stops at
/// paragraph breaks, so a chunk opening a new paragraph starts clean.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    debug_assert!(chunk_overlap < chunk_size);

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < n {
        while start < n && chars[start].is_whitespace() {
            start += 1;
        }
        if start >= n {
            break;
        }

        let hard_end = (start + chunk_size).min(n);
        let end = if hard_end == n {
            n
        } else {
            find_break(&chars, start, hard_end)
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed.to_string());
        }

        if end >= n {
            break;
        }
        // Overlap never re-crosses a paragraph break: a chunk that starts
        // a new paragraph must not leak the tail of the previous one.
        let mut next = end.saturating_sub(chunk_overlap);
        for i in (next + 1..=end).rev() {
            if i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n' {
                next = i;
                break;
            }
        }
        start = next.max(start + 1);
    }

    pieces
}

/// Pick the best cut position in `(start, hard_end]`, scanning backward for
/// each boundary class in priority order. Falls back to the hard limit.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    for i in (start + 1..=hard_end).rev() {
        if i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return i;
        }
    }
    for i in (start + 1..=hard_end).rev() {
        if chars[i - 1] == '\n' {
            return i;
        }
    }
    for i in (start + 1..=hard_end).rev() {
        if i >= 2 && chars[i - 2] == '.' && chars[i - 1] == ' ' {
            return i;
        }
    }
    for i in (start + 1..=hard_end).rev() {
        if chars[i - 1] == ' ' {
            return i;
        }
    }
    hard_end
}
