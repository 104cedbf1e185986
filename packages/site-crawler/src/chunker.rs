//! Recursive character text splitting.
//!
//! Splits long text into overlapping windows for embedding, preferring
//! paragraph breaks, then line breaks, then word boundaries, and only
//! cutting mid-word when a single word exceeds the chunk size. Lengths
//! are measured in characters.

use std::collections::VecDeque;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_CHUNK_OVERLAP: usize = 50;

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        assert!(
            chunk_overlap < chunk_size,
            "chunk overlap must be smaller than chunk size"
        );
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split `text` into chunks of at most `chunk_size` characters with
    /// `chunk_overlap` characters carried over between neighbors.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len() - 1, ""));
        let remaining = &separators[index + 1..];

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).map(String::from).collect()
        };

        let mut chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for piece in splits {
            if piece.chars().count() < self.chunk_size {
                good_splits.push(piece);
            } else {
                if !good_splits.is_empty() {
                    chunks.extend(self.merge_splits(&good_splits, separator));
                    good_splits.clear();
                }
                if remaining.is_empty() {
                    chunks.push(piece);
                } else {
                    chunks.extend(self.split_with(&piece, remaining));
                }
            }
        }
        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits, separator));
        }

        chunks
    }

    /// Greedily pack pieces into chunks, sliding a window so that up to
    /// `chunk_overlap` trailing characters repeat at the start of the
    /// next chunk.
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = separator.chars().count();
        let mut chunks = Vec::new();
        let mut window: VecDeque<&String> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = piece.chars().count();
            let join_cost = if window.is_empty() { 0 } else { sep_len };

            if total + len + join_cost > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = Self::join(&window, separator) {
                    chunks.push(chunk);
                }
                while total > self.chunk_overlap
                    || (total + len + if window.is_empty() { 0 } else { sep_len }
                        > self.chunk_size
                        && total > 0)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= front.chars().count()
                        + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }

        if let Some(chunk) = Self::join(&window, separator) {
            chunks.push(chunk);
        }

        chunks
    }

    fn join(window: &VecDeque<&String>, separator: &str) -> Option<String> {
        let joined = window
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(separator)
            .trim()
            .to_string();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.split("a short page about widgets");
        assert_eq!(chunks, vec!["a short page about widgets".to_string()]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let chunker = TextChunker::default();
        assert!(chunker.split("   \n\n  ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let chunker = TextChunker::default();
        let words: Vec<String> = (0..400).map(|i| format!("word{i:04}")).collect();
        let text = words.join(" ");

        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let chunker = TextChunker::default();
        let words: Vec<String> = (0..400).map(|i| format!("word{i:04}")).collect();
        let text = words.join(" ");

        let chunks = chunker.split(&text);
        for pair in chunks.windows(2) {
            let first_word_of_next = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].contains(first_word_of_next),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let chunker = TextChunker::new(40, 0);
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird paragraph here";
        let chunks = chunker.split(text);
        assert!(chunks.iter().all(|c| !c.contains("\n\n")));
        assert!(chunks.iter().any(|c| c.contains("first paragraph")));
    }

    #[test]
    fn test_oversized_word_is_hard_split() {
        let chunker = TextChunker::new(10, 0);
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker.split(text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_deterministic() {
        let chunker = TextChunker::default();
        let text = "lorem ipsum dolor sit amet ".repeat(60);
        assert_eq!(chunker.split(&text), chunker.split(&text));
    }
}
