//! Fixed-size character chunking with overlap.
//!
//! Windows are measured in `char`s, so multi-byte text never splits inside a
//! code point. Window `n` starts at `n * (size - overlap)`; the last window is
//! the first one that reaches the end of the text.

use crate::error::{KnowledgeError, KnowledgeResult};

/// One chunk of text with its character range in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    /// Zero-based position among the chunks that were yielded
    pub position: u32,
    /// Trimmed window text; never empty
    pub text: &'a str,
    /// Char offset of the window start
    pub start: usize,
    /// Char offset one past the window end
    pub end: usize,
}

/// Lazy chunk sequence over borrowed text.
///
/// Cloning yields an independent cursor, so a sequence can be restarted or
/// replayed without re-validating parameters.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    size: usize,
    step: usize,
    char_len: usize,
    start_char: usize,
    start_byte: usize,
    position: u32,
    done: bool,
}

/// Split `text` into windows of `size` chars overlapping by `overlap` chars.
///
/// Whitespace-only windows are skipped, so blank text yields no chunks.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> KnowledgeResult<Chunks<'_>> {
    if size == 0 || overlap >= size {
        return Err(KnowledgeError::InvalidInput(format!(
            "chunk size must exceed overlap (size={}, overlap={})",
            size, overlap
        )));
    }

    Ok(Chunks {
        text,
        size,
        step: size - overlap,
        char_len: text.chars().count(),
        start_char: 0,
        start_byte: 0,
        position: 0,
        done: text.is_empty(),
    })
}

/// Number of windows produced for `char_len` chars of non-blank text.
pub fn window_count(char_len: usize, size: usize, overlap: usize) -> usize {
    if char_len == 0 {
        return 0;
    }
    if char_len <= size {
        return 1;
    }
    let step = size - overlap;
    (char_len - overlap).div_ceil(step)
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let rest = &self.text[self.start_byte..];
            let window_bytes = rest
                .char_indices()
                .nth(self.size)
                .map_or(rest.len(), |(i, _)| i);
            let window = &rest[..window_bytes];

            let start = self.start_char;
            let end = (start + self.size).min(self.char_len);

            if end >= self.char_len {
                self.done = true;
            } else {
                let step_bytes = rest
                    .char_indices()
                    .nth(self.step)
                    .map_or(rest.len(), |(i, _)| i);
                self.start_byte += step_bytes;
                self.start_char += self.step;
            }

            let trimmed = window.trim();
            if trimmed.is_empty() {
                continue;
            }

            let chunk = TextChunk {
                position: self.position,
                text: trimmed,
                start,
                end,
            };
            self.position += 1;
            return Some(chunk);
        }
        None
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_chunk_text_basic() {
        let text = "a".repeat(1000);
        let chunks: Vec<_> = chunk_text(&text, 100, 20).unwrap().collect();

        assert_eq!(chunks.len(), window_count(1000, 100, 20));
        assert_eq!(chunks.len(), 13);
        assert_eq!(chunks[0].text.len(), 100);
        assert_eq!(chunks[1].start, 80);
        assert_eq!(chunks.last().unwrap().end, 1000);
    }

    #[test]
    fn test_short_text_single_trimmed_chunk() {
        let chunks: Vec<_> = chunk_text("  The sky is blue.  ", 1000, 200).unwrap().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The sky is blue.");
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert_eq!(chunk_text("", 10, 2).unwrap().count(), 0);
        assert_eq!(chunk_text(" \n\t  ", 10, 2).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(chunk_text("abc", 0, 0).is_err());
        assert!(chunk_text("abc", 10, 10).is_err());
        assert!(chunk_text("abc", 10, 11).is_err());
    }

    #[test]
    fn test_utf8_boundaries() {
        let text = "日本語のテキストです。".repeat(20);
        for chunk in chunk_text(&text, 7, 3).unwrap() {
            assert!(chunk.text.chars().count() <= 7);
        }
    }

    #[test]
    fn test_whitespace_windows_skipped_positions_contiguous() {
        let text = format!("alpha{}omega", " ".repeat(30));
        let chunks: Vec<_> = chunk_text(&text, 10, 0).unwrap().collect();
        let positions: Vec<u32> = chunks.iter().map(|c| c.position).collect();
        assert_eq!(positions, (0..chunks.len() as u32).collect::<Vec<_>>());
        assert_eq!(chunks.first().unwrap().text, "alpha");
        assert_eq!(chunks.last().unwrap().text, "omega");
    }

    #[test]
    fn test_restartable_via_clone() {
        let text = "x".repeat(50);
        let mut chunks = chunk_text(&text, 10, 5).unwrap();
        let replay = chunks.clone();
        chunks.next();
        chunks.next();
        assert_eq!(replay.count(), window_count(50, 10, 5));
    }

    proptest! {
        #[test]
        fn prop_chunk_count_law(
            len in 1usize..2000,
            size in 1usize..300,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((size as f64) * overlap_frac) as usize;
            prop_assume!(overlap < size);
            let text = "z".repeat(len);

            let count = chunk_text(&text, size, overlap).unwrap().count();
            prop_assert_eq!(count, window_count(len, size, overlap));
        }

        #[test]
        fn prop_deterministic_and_bounded(
            text in "[a-z ]{0,400}",
            size in 1usize..64,
            overlap in 0usize..64,
        ) {
            prop_assume!(overlap < size);
            let first: Vec<_> = chunk_text(&text, size, overlap).unwrap().collect();
            let second: Vec<_> = chunk_text(&text, size, overlap).unwrap().collect();
            prop_assert_eq!(&first, &second);
            for chunk in &first {
                prop_assert!(!chunk.text.is_empty());
                prop_assert!(chunk.text.chars().count() <= size);
            }
        }
    }
}
