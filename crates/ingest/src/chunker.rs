//! Overlapping-window chunking engine.
//!
//! Splits extracted document text into chunks of at most `max_size`
//! characters where consecutive chunks share exactly `overlap` characters.
//! Window ends prefer natural boundaries: paragraph break, then sentence
//! break, then any whitespace, falling back to a hard cut when the window
//! contains none.

use thiserror::Error;

// ── Configuration ───────────────────────────────────────────────────────────

/// Chunking parameters, in characters.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum characters per chunk (default: 1000).
    pub max_size: usize,
    /// Characters shared between adjacent chunks (default: 200).
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("max_size must be greater than zero")]
    ZeroMaxSize,
    #[error("overlap ({overlap}) must be smaller than max_size ({max_size})")]
    OverlapTooLarge { overlap: usize, max_size: usize },
}

// ── Chunk output ────────────────────────────────────────────────────────────

/// A bounded segment of source text. Owns its content; the source document
/// identifier is attached downstream by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based index within the document.
    pub index: usize,
    /// The chunk text.
    pub text: String,
    /// Character offset of this chunk's start in the original text.
    pub start: usize,
}

// ── Public entry points ─────────────────────────────────────────────────────

/// Build a lazy chunk iterator over `text`. Fails only on invalid parameters.
pub fn split<'a>(text: &'a str, config: &ChunkConfig) -> Result<Chunks<'a>, ChunkingError> {
    if config.max_size == 0 {
        return Err(ChunkingError::ZeroMaxSize);
    }
    if config.overlap >= config.max_size {
        return Err(ChunkingError::OverlapTooLarge {
            overlap: config.overlap,
            max_size: config.max_size,
        });
    }
    Ok(Chunks {
        text,
        pos: 0,
        char_pos: 0,
        index: 0,
        max_size: config.max_size,
        overlap: config.overlap,
    })
}

/// Convenience: collect all chunks eagerly.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkingError> {
    Ok(split(text, config)?.collect())
}

// ── Iterator ────────────────────────────────────────────────────────────────

/// Lazy, finite, restartable chunk sequence. Cloning restarts from the
/// position at clone time; call [`split`] again for a fresh pass.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of the current window start.
    pos: usize,
    /// Character offset of the current window start.
    char_pos: usize,
    index: usize,
    max_size: usize,
    overlap: usize,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.pos >= self.text.len() {
            return None;
        }

        let window = &self.text[self.pos..];
        let window_end = byte_at_char(window, self.max_size);

        let cut = if window_end >= window.len() {
            // Final window: take everything that remains.
            window.len()
        } else {
            pick_cut(&window[..window_end], self.overlap)
        };

        let chunk = Chunk {
            index: self.index,
            text: window[..cut].to_string(),
            start: self.char_pos,
        };
        self.index += 1;

        if self.pos + cut >= self.text.len() {
            self.pos = self.text.len();
        } else {
            // Back up `overlap` characters from the cut so adjacent chunks
            // share exactly that many.
            let cut_chars = window[..cut].chars().count();
            let step_chars = cut_chars - self.overlap;
            self.pos += byte_at_char(&window[..cut], step_chars);
            self.char_pos += step_chars;
        }

        Some(chunk)
    }
}

// ── Cut selection ───────────────────────────────────────────────────────────

/// Byte offset of the `n`th character in `s`, or `s.len()` if shorter.
fn byte_at_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Choose the cut position (in bytes) for a full window. Candidates are
/// rejected when they would leave the cut at or before `overlap` characters
/// in, which would stall the window.
fn pick_cut(window: &str, overlap: usize) -> usize {
    let accept = |cut: usize| -> Option<usize> {
        (window[..cut].chars().count() > overlap).then_some(cut)
    };

    // Paragraph break: cut after the blank line.
    if let Some(cut) = window.rfind("\n\n").and_then(|i| accept(i + 2)) {
        return cut;
    }

    // Sentence break: cut after the terminal punctuation and its space.
    let sentence = [". ", "! ", "? "]
        .iter()
        .filter_map(|sep| window.rfind(sep))
        .max();
    if let Some(cut) = sentence.and_then(|i| accept(i + 2)) {
        return cut;
    }

    // Any whitespace, to avoid mid-word breaks.
    let ws = window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8());
    if let Some(cut) = ws.and_then(accept) {
        return cut;
    }

    // Hard cut at the window end.
    window.len()
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig { max_size, overlap }
    }

    #[test]
    fn rejects_zero_max_size() {
        assert!(matches!(
            split("text", &config(0, 0)),
            Err(ChunkingError::ZeroMaxSize)
        ));
    }

    #[test]
    fn rejects_overlap_not_below_max_size() {
        assert!(matches!(
            split("text", &config(10, 10)),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            split("text", &config(10, 11)),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = chunk_text("hello world", &config(100, 10)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start, 0);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = chunk_text("", &config(100, 10)).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn three_thousand_chars_max_1000_overlap_200_gives_four_chunks() {
        // Repeating 10-char unit so every window cut lands on whitespace
        // exactly at the window end.
        let text = "abcdefghi ".repeat(300);
        assert_eq!(text.chars().count(), 3000);

        let chunks = chunk_text(&text, &config(1000, 200)).unwrap();
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].text.chars().count() - 200)
                .collect();
            let head: String = pair[1].text.chars().take(200).collect();
            assert_eq!(tail, head, "adjacent chunks must share exactly 200 chars");
        }
    }

    #[test]
    fn hard_cut_when_no_boundary_exists() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, &config(100, 20)).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].text.len(), 100);
        // Exact overlap still holds on hard cuts.
        assert_eq!(&chunks[0].text[80..], &chunks[1].text[..20]);
    }

    #[test]
    fn prefers_paragraph_break() {
        let first = "First paragraph with enough words to matter here.";
        let text = format!("{first}\n\nSecond paragraph continues with more text after the break.");
        let chunks = chunk_text(&text, &config(60, 10)).unwrap();
        assert!(chunks[0].text.ends_with("\n\n"), "cut should land after the blank line");
        assert!(chunks[0].text.starts_with("First paragraph"));
    }

    #[test]
    fn prefers_sentence_break_over_word_break() {
        let text = "A short sentence ends here. Another sentence follows with several more words in it.";
        let chunks = chunk_text(&text, &config(40, 5)).unwrap();
        assert!(chunks[0].text.ends_with(". "), "got {:?}", chunks[0].text);
    }

    #[test]
    fn avoids_mid_word_breaks_when_whitespace_available() {
        let text = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima";
        let chunks = chunk_text(&text, &config(30, 5)).unwrap();
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.text.ends_with(' '),
                "non-final chunk should cut at whitespace: {:?}",
                chunk.text
            );
        }
    }

    #[test]
    fn covers_full_input() {
        let text = "word ".repeat(500);
        let cfg = config(120, 30);
        let chunks = chunk_text(&text, &cfg).unwrap();
        // Reconstruct by dropping each successor's overlap prefix.
        let mut rebuilt = chunks[0].text.clone();
        for pair in chunks.windows(2) {
            let skip = byte_at_char(&pair[1].text, cfg.overlap);
            rebuilt.push_str(&pair[1].text[skip..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn last_chunk_may_be_shorter() {
        let text = "z".repeat(120);
        let chunks = chunk_text(&text, &config(100, 10)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text.len(), 30);
    }

    #[test]
    fn iterator_is_lazy_and_restartable() {
        let text = "q".repeat(1000);
        let cfg = config(100, 10);
        let mut first_pass = split(&text, &cfg).unwrap();
        let head_a = first_pass.next().unwrap();

        let mut second_pass = split(&text, &cfg).unwrap();
        let head_b = second_pass.next().unwrap();
        assert_eq!(head_a, head_b);
    }

    #[test]
    fn indices_and_offsets_are_sequential() {
        let text = "abcdefghi ".repeat(100);
        let chunks = chunk_text(&text, &config(200, 50)).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn multibyte_text_never_splits_a_char() {
        let text = "héllo wörld ünïcode ".repeat(50);
        let chunks = chunk_text(&text, &config(40, 8)).unwrap();
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 40);
        }
    }
}
