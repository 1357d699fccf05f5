//! Text chunking module
//!
//! Splits page text into overlapping windows for embedding. Lengths are
//! counted in characters (Unicode scalar values), not bytes.

use raga_common::config::ChunkingConfig;
use raga_common::{AppError, Result};
use std::collections::VecDeque;
use tracing::debug;

/// Separators tried from coarsest to finest
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Byte range of the input produced by recursive splitting
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: usize,
    end: usize,
    /// Index of the first separator still available for further splitting
    level: usize,
    /// Fixed-size character run, may be cut anywhere
    hard: bool,
}

impl Segment {
    fn hard(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            level: SEPARATORS.len(),
            hard: true,
        }
    }
}

/// Recursive character splitter with a fixed overlap
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Build a chunker; fails unless `0 <= chunk_overlap < chunk_size`
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(AppError::configuration(format!(
                "invalid chunking parameters: size {}, overlap {}",
                config.chunk_size, config.chunk_overlap
            )));
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// New text each window after the first contributes
    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split text into chunks no longer than `chunk_size`.
    ///
    /// The first chunk fills up to `chunk_size`. Each later chunk starts with
    /// the `overlap` characters that precede its window, so its window holds
    /// at most `chunk_size - overlap`. Whitespace-only windows are dropped.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut segments = Vec::new();
        self.segment(text, 0, text.len(), 0, self.chunk_size, &mut segments);
        let segment_count = segments.len();

        let chunks: Vec<String> = self
            .windows(text, segments)
            .into_iter()
            .filter(|&(start, end)| !text[start..end].trim().is_empty())
            .map(|(start, end)| text[self.overlap_start(text, start)..end].to_string())
            .collect();

        debug!(
            input_chars = text.chars().count(),
            segment_count,
            chunk_count = chunks.len(),
            "Text chunked"
        );

        chunks
    }

    /// Cut `text[start..end]` into segments of at most `limit` characters,
    /// trying `SEPARATORS[level..]` in order.
    /// Separators stay at the end of the piece they terminate.
    fn segment(
        &self,
        text: &str,
        start: usize,
        end: usize,
        level: usize,
        limit: usize,
        out: &mut Vec<Segment>,
    ) {
        let piece = &text[start..end];
        if piece.chars().count() <= limit {
            out.push(Segment { start, end, level, hard: false });
            return;
        }

        let separators = &SEPARATORS[level.min(SEPARATORS.len())..];
        match separators.iter().position(|sep| piece.contains(sep)) {
            Some(i) => {
                let sep = separators[i];
                let finer = level + i + 1;
                let mut cursor = start;

                for (offset, _) in piece.match_indices(sep) {
                    let cut = start + offset + sep.len();
                    self.segment(text, cursor, cut, finer, limit, out);
                    cursor = cut;
                }
                if cursor < end {
                    self.segment(text, cursor, end, finer, limit, out);
                }
            }
            None => {
                // No separator left: fixed-size character runs
                let mut cursor = start;
                let mut count = 0;
                for (offset, _) in piece.char_indices() {
                    if count == limit {
                        out.push(Segment::hard(cursor, start + offset));
                        cursor = start + offset;
                        count = 0;
                    }
                    count += 1;
                }
                out.push(Segment::hard(cursor, end));
            }
        }
    }

    /// Greedily merge contiguous segments into windows.
    ///
    /// The first window may hold `chunk_size` characters, later ones `stride`.
    /// A separator-bounded segment too long for an empty window is split
    /// again at that budget; character runs are cut to fill the window.
    fn windows(&self, text: &str, segments: Vec<Segment>) -> Vec<(usize, usize)> {
        let mut pending: VecDeque<Segment> = segments.into();
        let mut windows = Vec::new();
        let mut window_start = 0;
        let mut window_end = 0;
        let mut window_len = 0;

        while let Some(seg) = pending.pop_front() {
            let budget = if windows.is_empty() {
                self.chunk_size
            } else {
                self.stride()
            };
            let len = text[seg.start..seg.end].chars().count();

            if window_len + len <= budget {
                if window_len == 0 {
                    window_start = seg.start;
                }
                window_end = seg.end;
                window_len += len;
                continue;
            }

            let room = budget - window_len;
            if seg.hard && room > 0 {
                let cut = text[seg.start..seg.end]
                    .char_indices()
                    .nth(room)
                    .map(|(offset, _)| seg.start + offset)
                    .unwrap_or(seg.end);
                pending.push_front(Segment::hard(cut, seg.end));
                pending.push_front(Segment::hard(seg.start, cut));
                continue;
            }

            if window_len == 0 {
                let mut finer = Vec::new();
                self.segment(text, seg.start, seg.end, seg.level, budget, &mut finer);
                for piece in finer.into_iter().rev() {
                    pending.push_front(piece);
                }
                continue;
            }

            windows.push((window_start, window_end));
            window_len = 0;
            pending.push_front(seg);
        }

        if window_len > 0 {
            windows.push((window_start, window_end));
        }

        windows
    }

    /// Byte offset where the overlap prefix of a window starting at `window_start` begins
    fn overlap_start(&self, text: &str, window_start: usize) -> usize {
        if self.overlap == 0 {
            return window_start;
        }

        text[..window_start]
            .char_indices()
            .rev()
            .nth(self.overlap - 1)
            .map(|(offset, _)| offset)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(&ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
        .unwrap()
    }

    /// Rebuild the input from chunks, checking each overlap prefix on the way
    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut text = String::new();
        for chunk in chunks {
            let seen = text.chars().count();
            let prefix_len = overlap.min(seen);
            let expected: String = text.chars().skip(seen - prefix_len).collect();
            let prefix: String = chunk.chars().take(prefix_len).collect();
            assert_eq!(prefix, expected, "overlap prefix mismatch");
            text.extend(chunk.chars().skip(prefix_len));
        }
        text
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunker(2500, 800).split("The sky is blue.");
        assert_eq!(chunks, vec!["The sky is blue.".to_string()]);
    }

    #[test]
    fn test_text_within_chunk_size_is_one_chunk() {
        let text = "word ".repeat(400);
        let chunks = Chunker::new(&ChunkingConfig::default()).unwrap().split(&text);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_first_chunk_fills_chunk_size() {
        let text = "word ".repeat(1000);
        let chunks = Chunker::new(&ChunkingConfig::default()).unwrap().split(&text);

        assert_eq!(chunks[0].chars().count(), 2500);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 2500);
        }
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.chars().count(), 2500);
        }
        assert_eq!(reconstruct(&chunks, 800), text);
    }

    #[test]
    fn test_long_sentence_is_split_again_after_first_window() {
        // Each line fits the first window but not the later, smaller ones
        let line = format!("{}\n", "ab ".repeat(8));
        let text = line.repeat(3);
        let c = chunker(30, 10);
        let chunks = c.split(&text);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30);
        }
        assert_eq!(reconstruct(&chunks, 10), text);
    }

    #[test]
    fn test_empty_and_blank_text() {
        let c = chunker(100, 20);
        assert!(c.split("").is_empty());
        assert!(c.split("   \n\n  ").is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        let err = Chunker::new(&ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let chunks = chunker(10, 2).split("abcdef\n\nghijkl");
        assert_eq!(chunks, vec!["abcdef\n\n".to_string(), "\n\nghijkl".to_string()]);
    }

    #[test]
    fn test_max_size_and_reconstruction() {
        let text = "Rust is a systems language. It has ownership and borrowing.\n".repeat(40)
            + &"Paragraph two talks about lifetimes and traits. ".repeat(30);
        let c = chunker(300, 80);
        let chunks = c.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 300);
        }
        assert_eq!(reconstruct(&chunks, 80), text);
    }

    #[test]
    fn test_exact_overlap_between_consecutive_chunks() {
        let text = "word ".repeat(500);
        let chunks = chunker(120, 30).split(&text);

        for pair in chunks.windows(2) {
            let tail: String = {
                let chars: Vec<char> = pair[0].chars().collect();
                chars[chars.len() - 30..].iter().collect()
            };
            let head: String = pair[1].chars().take(30).collect();
            assert_eq!(head, tail);
        }
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "x".repeat(100);
        let chunks = chunker(30, 10).split(&text);

        let lengths: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![30, 30, 30, 30, 20]);
        assert_eq!(reconstruct(&chunks, 10), text);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "é".repeat(50);
        let chunks = chunker(20, 5).split(&text);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20);
        }
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn test_zero_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunker(12, 0).split(text);
        assert_eq!(chunks.concat(), text);
    }
}
