//! Text chunking for TTS processing.
//!
//! Chunks are packed greedily word by word. Boundaries only ever fall between
//! a whitespace run and the next word, and the input is never rewritten, so
//! joining the chunks gives back the original text byte for byte.

use super::TextChunk;

/// A maximal run of non-whitespace characters.
#[derive(Debug, Clone, Copy)]
struct Word {
    start_byte: usize,
    start_char: usize,
    end_char: usize,
}

/// Split text into ordered chunks whose spoken length stays within `max_chars`.
///
/// # Arguments
/// * `text` - The text to chunk, any length
/// * `max_chars` - Maximum characters from a chunk's first word to its last word.
///   Values below 1 are treated as 1.
///
/// # Returns
/// Chunks in input order. Empty input gives no chunks. A single word longer than
/// `max_chars` is never broken; it becomes a chunk of its own.
pub fn split(text: &str, max_chars: usize) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    let words = find_words(text);

    if words.is_empty() {
        // Nothing speakable; keep the whitespace so the split stays lossless.
        return vec![TextChunk::new(0, text)];
    }

    let mut chunks = Vec::new();
    let mut chunk_start = 0;
    let mut group_first = words[0];

    for word in &words[1..] {
        let span = word.end_char - group_first.start_char;
        if span > max_chars {
            // The whitespace before `word` stays with the chunk being closed.
            chunks.push(TextChunk::new(
                chunks.len(),
                &text[chunk_start..word.start_byte],
            ));
            chunk_start = word.start_byte;
            group_first = *word;
        }
    }

    chunks.push(TextChunk::new(chunks.len(), &text[chunk_start..]));
    chunks
}

/// Locate every word in the text, with byte and character offsets.
fn find_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut char_count = 0;

    for (char_pos, (byte_pos, c)) in text.char_indices().enumerate() {
        if c.is_whitespace() {
            if let Some((start_byte, start_char)) = current.take() {
                words.push(Word {
                    start_byte,
                    start_char,
                    end_char: char_pos,
                });
            }
        } else if current.is_none() {
            current = Some((byte_pos, char_pos));
        }
        char_count = char_pos + 1;
    }

    if let Some((start_byte, start_char)) = current {
        words.push(Word {
            start_byte,
            start_char,
            end_char: char_count,
        });
    }

    words
}
