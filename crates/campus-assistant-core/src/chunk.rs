//! Semantic text chunker with sentence-level overlap.
//!
//! Splits a source text into [`Chunk`]s of at most `chunk_size` characters.
//! Splitting prefers the largest semantic unit that fits:
//!
//! | Level | Unit | Boundary |
//! |-------|------|----------|
//! | 0 | page | a line starting with `Page N —` (or `-`, `–`) |
//! | 1 | paragraph | a blank line |
//! | 2 | sentence | whitespace after `.`, `!` or `?` |
//! | 3 | hard piece | last whitespace inside the window, else the window edge |
//!
//! Units are then packed greedily into chunks. When a chunk is flushed, its
//! trailing units (up to `chunk_overlap` characters) seed the next chunk so
//! neighbouring chunks share context. A seed that would push the next chunk
//! over `chunk_size` is dropped. [`Chunk::overlap`] records how many leading
//! characters were repeated, so callers can strip them again.
//!
//! Lengths are counted in `char`s, not bytes.
//!
//! # Example
//!
//! ```rust
//! use campus_assistant_core::chunk::chunk_text;
//!
//! let chunks = chunk_text(&"A".repeat(900), 300, 50);
//! assert_eq!(chunks.len(), 3);
//! assert!(chunks.iter().all(|c| c.text.chars().count() <= 300));
//! ```

use regex::Regex;

/// One bounded piece of a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position within the source text.
    pub index: usize,
    pub text: String,
    /// Leading characters of `text` repeated from the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// The chunk text without the prefix shared with the previous chunk.
    pub fn fresh_text(&self) -> String {
        self.text
            .chars()
            .skip(self.overlap)
            .collect::<String>()
            .trim_start()
            .to_string()
    }
}

struct Unit<'a> {
    text: &'a str,
    sep: &'static str,
}

const PARAGRAPH_SEP: &str = "\n\n";
const SENTENCE_SEP: &str = " ";

/// Split `text` into chunks of at most `chunk_size` characters.
///
/// Returns an empty vector for blank input or a zero `chunk_size`.
/// Chunk indices are contiguous from 0.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let mut units = Vec::new();
    collect_units(text, 0, chunk_size, &mut units);

    let mut chunks = Vec::new();
    let mut window: Vec<usize> = Vec::new();
    let mut seed_count = 0;

    for (i, unit) in units.iter().enumerate() {
        if !window.is_empty() {
            let unit_len = char_len(unit.text) + char_len(unit.sep);
            if joined_len(&units, &window) + unit_len > chunk_size {
                if window.len() > seed_count {
                    push_chunk(&mut chunks, &units, &window, seed_count);
                    window = overlap_tail(&units, &window, chunk_overlap);
                    seed_count = window.len();
                }
                if !window.is_empty() && joined_len(&units, &window) + unit_len > chunk_size {
                    window.clear();
                    seed_count = 0;
                }
            }
        }
        window.push(i);
    }
    if window.len() > seed_count {
        push_chunk(&mut chunks, &units, &window, seed_count);
    }

    chunks
}

fn collect_units<'a>(text: &'a str, level: usize, chunk_size: usize, out: &mut Vec<Unit<'a>>) {
    let sep = if level <= 2 {
        PARAGRAPH_SEP
    } else {
        SENTENCE_SEP
    };
    if char_len(text) <= chunk_size {
        out.push(Unit { text, sep });
        return;
    }
    match level {
        0 => split_pages(text)
            .into_iter()
            .for_each(|p| collect_units(p, 1, chunk_size, out)),
        1 => split_paragraphs(text)
            .into_iter()
            .for_each(|p| collect_units(p, 2, chunk_size, out)),
        2 => split_sentences(text)
            .into_iter()
            .for_each(|s| collect_units(s, 3, chunk_size, out)),
        _ => hard_split(text, chunk_size)
            .into_iter()
            .for_each(|piece| out.push(Unit {
                text: piece,
                sep: SENTENCE_SEP,
            })),
    }
}

fn split_pages(text: &str) -> Vec<&str> {
    let marker = match Regex::new(r"(?m)^[ \t]*Page\s+\d+\s*[—–-]") {
        Ok(re) => re,
        Err(_) => return vec![text],
    };
    let mut starts: Vec<usize> = marker.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return vec![text];
    }
    if starts[0] != 0 {
        starts.insert(0, 0);
    }
    starts.push(text.len());
    starts
        .windows(2)
        .map(|w| text[w[0]..w[1]].trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    match Regex::new(r"\n\s*\n") {
        Ok(re) => re
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect(),
        Err(_) => vec![text],
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() && prev_terminal {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = i;
        }
        prev_terminal = matches!(c, '.' | '!' | '?');
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Cut `text` into pieces of at most `chunk_size` chars, preferring whitespace.
fn hard_split(text: &str, chunk_size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let window_end = match rest.char_indices().nth(chunk_size) {
            Some((byte, _)) => byte,
            None => {
                pieces.push(rest);
                break;
            }
        };
        let cut = match rest[..window_end].rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => pos,
            _ => window_end,
        };
        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        rest = rest[cut..].trim_start();
    }
    pieces
}

/// Trailing units of `window` whose joined length fits in `overlap` chars.
fn overlap_tail(units: &[Unit<'_>], window: &[usize], overlap: usize) -> Vec<usize> {
    let mut tail = Vec::new();
    for &idx in window.iter().rev() {
        let mut candidate = vec![idx];
        candidate.extend_from_slice(&tail);
        if joined_len(units, &candidate) > overlap {
            break;
        }
        tail = candidate;
    }
    tail
}

fn joined_len(units: &[Unit<'_>], window: &[usize]) -> usize {
    window
        .iter()
        .enumerate()
        .map(|(pos, &idx)| {
            let sep = if pos == 0 { 0 } else { char_len(units[idx].sep) };
            sep + char_len(units[idx].text)
        })
        .sum()
}

fn push_chunk(chunks: &mut Vec<Chunk>, units: &[Unit<'_>], window: &[usize], seed_count: usize) {
    let mut text = String::new();
    for (pos, &idx) in window.iter().enumerate() {
        if pos > 0 {
            text.push_str(units[idx].sep);
        }
        text.push_str(units[idx].text);
    }
    chunks.push(Chunk {
        index: chunks.len(),
        text,
        overlap: joined_len(units, &window[..seed_count]),
    });
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn reassemble(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.fresh_text()).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 300, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(chunk_text("", 300, 50).is_empty());
        assert!(chunk_text(" \n\n ", 300, 50).is_empty());
    }

    #[test]
    fn test_unbroken_run_is_hard_split() {
        let chunks = chunk_text(&"A".repeat(900), 300, 50);
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.text.chars().count(), 300);
            assert_eq!(c.overlap, 0);
        }
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} talks about the campus fest.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 120, 40);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 120, "oversized: {}", c.text);
        }
    }

    #[test]
    fn test_overlap_repeats_last_sentence() {
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        let chunks = chunk_text(text, 32, 16);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].overlap > 0);
        let shared: String = chunks[1].text.chars().take(chunks[1].overlap).collect();
        assert!(chunks[0].text.ends_with(&shared));
    }

    #[test]
    fn test_round_trip_without_overlap() {
        let text = "Page 1 — Welcome\nThe campus opened in 2005.\n\nIt hosts five departments. \
                    Each department runs a club.\n\nPage 2 — Events\nThe tech fest happens in March! \
                    Sports week follows in April? Yes.";
        for (size, overlap) in [(40, 0), (40, 20), (80, 30), (300, 50), (12, 5)] {
            let chunks = chunk_text(text, size, overlap);
            assert_eq!(squash(&reassemble(&chunks)), squash(text), "size {}", size);
        }
    }

    #[test]
    fn test_page_markers_start_chunks() {
        let text = "Page 1 — Intro\nAbout the college.\n\nPage 2 — Fees\nFee details here.";
        let chunks = chunk_text(text, 40, 0);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("Page 1"));
        assert!(chunks[1].text.starts_with("Page 2"));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘".repeat(5);
        let chunks = chunk_text(&text, 25, 5);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.chars().count() <= 25);
        }
        assert_eq!(squash(&reassemble(&chunks)), squash(&text));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha.\n\nBeta.\n\nGamma.\n\nDelta.";
        assert_eq!(chunk_text(text, 10, 4), chunk_text(text, 10, 4));
    }
}
