//! Text chunker
//!
//! Splits a document into pieces no longer than the speech service accepts.
//! Cuts fall on the last whitespace inside the window so words stay intact;
//! a window without whitespace is cut hard at the limit.
//!
//! Lengths are counted in characters, so a cut never lands inside a UTF-8
//! sequence.

use crate::models::Chunk;
use thiserror::Error;

/// Chunker errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("Maximum chunk length must be positive")]
    InvalidMaxLength,
}

/// Split `text` into chunks of at most `max_length` characters.
///
/// Whitespace at the cut points is dropped; empty or whitespace-only text
/// yields no chunks.
pub fn split_text(text: &str, max_length: usize) -> Result<Vec<String>, ChunkerError> {
    if max_length == 0 {
        return Err(ChunkerError::InvalidMaxLength);
    }

    let mut chunks = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        // Byte offset of the first character past the window, if any
        let Some((limit, overflow)) = rest.char_indices().nth(max_length) else {
            let tail = rest.trim_end();
            if !tail.is_empty() {
                chunks.push(tail.to_string());
            }
            break;
        };

        // Whitespace at position max_length still leaves a max_length chunk
        let window = &rest[..limit + overflow.len_utf8()];
        let cut = window
            .char_indices()
            .filter(|(i, c)| *i > 0 && c.is_whitespace())
            .last()
            .map(|(i, _)| i)
            .unwrap_or(limit);

        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    Ok(chunks)
}

/// Split a document into indexed chunks
pub fn chunk_document(text: &str, max_length: usize) -> Result<Vec<Chunk>, ChunkerError> {
    Ok(split_text(text, max_length)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk::new(index, text))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_zero_max_length_fails_fast() {
        assert_eq!(split_text("hello", 0), Err(ChunkerError::InvalidMaxLength));
    }

    #[test]
    fn test_empty_and_whitespace_only_yield_nothing() {
        assert!(split_text("", 10).unwrap().is_empty());
        assert!(split_text("   \n\t  ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_trimmed_chunk() {
        assert_eq!(split_text("  hello world \n", 100).unwrap(), vec!["hello world"]);
        assert_eq!(split_text("exactly10!", 10).unwrap(), vec!["exactly10!"]);
    }

    #[test]
    fn test_cuts_at_last_whitespace() {
        let chunks = split_text("the quick brown fox jumps", 10).unwrap();
        assert_eq!(chunks, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn test_whitespace_exactly_at_limit_keeps_full_window() {
        // Space sits at index 5; chunk may be exactly 5 characters
        let chunks = split_text("abcde fghij", 5).unwrap();
        assert_eq!(chunks, vec!["abcde", "fghij"]);
    }

    #[test]
    fn test_long_word_is_force_cut_at_limit() {
        let chunks = split_text("abcdefghijkl mn", 5).unwrap();
        assert_eq!(chunks, vec!["abcde", "fghij", "kl mn"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "ééééé ééééé";
        let chunks = split_text(text, 5).unwrap();
        assert_eq!(chunks, vec!["ééééé", "ééééé"]);

        let forced = split_text("日本語のテキスト", 3).unwrap();
        assert_eq!(forced, vec!["日本語", "のテキ", "スト"]);
    }

    #[test]
    fn test_newlines_count_as_boundaries() {
        let chunks = split_text("first line\nsecond line", 12).unwrap();
        assert_eq!(chunks, vec!["first line", "second line"]);
    }

    #[test]
    fn test_every_chunk_within_limit_and_content_preserved() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
                    Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.\n\n\
                    Ut enim ad minim veniam,   quis nostrud exercitation ullamco.";
        for max_length in [12, 17, 25, 40, 64, 1000] {
            let chunks = split_text(text, max_length).unwrap();
            assert!(chunks.iter().all(|c| !c.is_empty()));
            assert!(
                chunks.iter().all(|c| c.chars().count() <= max_length),
                "max_length {}",
                max_length
            );
            assert_eq!(collapse(&chunks.join(" ")), collapse(text), "max_length {}", max_length);
        }
    }

    #[test]
    fn test_ten_thousand_chars_make_three_chunks() {
        let word = "speech ";
        let text: String = word.repeat(10_000 / word.len() + 1).chars().take(10_000).collect();
        assert_eq!(text.chars().count(), 10_000);

        let chunks = chunk_document(&text, 4096).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_max_length_one() {
        let chunks = split_text("ab c", 1).unwrap();
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }
}
