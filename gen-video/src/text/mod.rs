//! Text segmentation for TTS: splitting unbounded input into speakable chunks.

pub mod chunker;

pub use chunker::split;

/// A chunk of source text ready for TTS processing.
///
/// `content` is a verbatim slice of the input, including the whitespace that
/// followed it, so concatenating every chunk in order reproduces the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk in the input
    pub index: usize,
    /// The verbatim text
    pub content: String,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
        }
    }

    /// The text handed to the speech engine: content without surrounding whitespace.
    pub fn spoken(&self) -> &str {
        self.content.trim()
    }

    /// Length of the spoken text in characters.
    pub fn word_len(&self) -> usize {
        self.spoken().chars().count()
    }

    /// Whether there is nothing to speak.
    pub fn is_blank(&self) -> bool {
        self.spoken().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_chunk_creation() {
        let chunk = TextChunk::new(1, "Hello world  ");
        assert_eq!(chunk.index, 1);
        assert_eq!(chunk.content, "Hello world  ");
        assert_eq!(chunk.spoken(), "Hello world");
        assert_eq!(chunk.word_len(), 11);
        assert!(!chunk.is_blank());
    }

    #[test]
    fn test_blank_chunk() {
        let chunk = TextChunk::new(0, " \n\t ");
        assert!(chunk.is_blank());
        assert_eq!(chunk.word_len(), 0);
    }

    #[test]
    fn test_word_len_counts_characters_not_bytes() {
        let chunk = TextChunk::new(0, "héllo wörld");
        assert_eq!(chunk.word_len(), 11);
    }
}
