//! Size-bounded chunking of text for classification payloads.
//!
//! Text is split on line boundaries and lines are packed into chunks so that
//! `extra + chunk` never exceeds the configured chunk size. A line that is
//! longer than the budget on its own is cut into consecutive slices. Lengths
//! are counted in `char`s, so slices never split a code point.

use std::fmt;

use serde::Serialize;

use crate::error::{ChatError, Result};
use crate::metrics::MetricsCollector;

/// Chunk size used when none is configured
pub const DEFAULT_CHUNK_SIZE: usize = 30_000;

/// Separator between lines inside a chunk and between whole-line chunks
pub const LINE_SEPARATOR: char = '\n';

/// One slice of the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    text: String,
    ends_mid_line: bool,
}

impl Chunk {
    /// Chunk text without the shared context
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the chunk, returning its text
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }

    /// Length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// True when this is a leading slice of an oversized line, i.e. the next
    /// chunk continues the same line with no separator in between
    #[must_use]
    pub const fn ends_mid_line(&self) -> bool {
        self.ends_mid_line
    }

    /// The payload as sent: `extra` followed by the chunk text
    #[must_use]
    pub fn with_context(&self, extra: &str) -> String {
        let mut payload = String::with_capacity(extra.len() + self.text.len());
        payload.push_str(extra);
        payload.push_str(&self.text);
        payload
    }
}

impl AsRef<str> for Chunk {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Characters available to chunk text once `extra` is reserved
pub fn effective_budget(extra: &str, chunk_size: usize) -> Result<usize> {
    let extra_len = extra.chars().count();
    if chunk_size <= extra_len {
        return Err(ChatError::Config(format!(
            "chunk_size {chunk_size} leaves no room after {extra_len} characters of extra context"
        )));
    }
    Ok(chunk_size - extra_len)
}

/// Split `text` on `\n` and pack the lines into chunks.
pub fn chunk_text(text: &str, extra: &str, chunk_size: usize) -> Result<Vec<Chunk>> {
    let budget = effective_budget(extra, chunk_size)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(pack_lines(text.split(LINE_SEPARATOR), budget))
}

/// Pack an already split sequence of lines into chunks.
///
/// An empty sequence, or one holding a single empty line, yields no chunks.
pub fn chunk_lines<I, S>(lines: I, extra: &str, chunk_size: usize) -> Result<Vec<Chunk>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let budget = effective_budget(extra, chunk_size)?;
    let lines: Vec<S> = lines.into_iter().collect();
    match lines.as_slice() {
        [] => return Ok(Vec::new()),
        [only] if only.as_ref().is_empty() => return Ok(Vec::new()),
        _ => {}
    }
    Ok(pack_lines(lines.iter().map(AsRef::as_ref), budget))
}

/// Rebuild the original text from its chunks
#[must_use]
pub fn join_chunks(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        out.push_str(&chunk.text);
        if i + 1 < chunks.len() && !chunk.ends_mid_line {
            out.push(LINE_SEPARATOR);
        }
    }
    out
}

fn pack_lines<'a>(lines: impl Iterator<Item = &'a str>, budget: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    // Separate from `current.is_empty()`: a chunk may hold a single empty line.
    let mut has_lines = false;

    for line in lines {
        let line_len = line.chars().count();

        if line_len > budget {
            if has_lines {
                chunks.push(whole(std::mem::take(&mut current)));
                current_len = 0;
                has_lines = false;
            }
            push_slices(&mut chunks, line, budget);
            continue;
        }

        if has_lines && current_len + 1 + line_len > budget {
            chunks.push(whole(std::mem::take(&mut current)));
            current_len = 0;
            has_lines = false;
        }

        if has_lines {
            current.push(LINE_SEPARATOR);
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
        has_lines = true;
    }

    if has_lines {
        chunks.push(whole(current));
    }
    chunks
}

fn whole(text: String) -> Chunk {
    Chunk {
        text,
        ends_mid_line: false,
    }
}

fn push_slices(chunks: &mut Vec<Chunk>, line: &str, budget: usize) {
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in line.char_indices() {
        if count == budget {
            chunks.push(Chunk {
                text: line[start..idx].to_string(),
                ends_mid_line: true,
            });
            start = idx;
            count = 0;
        }
        count += 1;
    }

    chunks.push(whole(line[start..].to_string()));
}

/// A chunker bound to a chunk size and shared context
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    extra: String,
    budget: usize,
    metrics: MetricsCollector,
}

impl Chunker {
    /// Chunker with no shared context
    pub fn new(chunk_size: usize) -> Result<Self> {
        Self::with_extra(chunk_size, String::new())
    }

    /// Chunker reserving room for `extra` in every chunk
    pub fn with_extra(chunk_size: usize, extra: impl Into<String>) -> Result<Self> {
        let extra = extra.into();
        let budget = effective_budget(&extra, chunk_size)?;
        Ok(Self {
            chunk_size,
            extra,
            budget,
            metrics: MetricsCollector::default(),
        })
    }

    /// Configured chunk size
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Shared context reserved in every chunk
    #[must_use]
    pub fn extra(&self) -> &str {
        &self.extra
    }

    /// Characters left for chunk text
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Chunk a string, splitting it on line boundaries
    #[must_use]
    pub fn chunk_text(&self, text: &str) -> Vec<Chunk> {
        let chunks = if text.is_empty() {
            Vec::new()
        } else {
            pack_lines(text.split(LINE_SEPARATOR), self.budget)
        };
        self.report(&chunks);
        chunks
    }

    /// Chunk an already split sequence of lines
    #[must_use]
    pub fn chunk_lines<S: AsRef<str>>(&self, lines: &[S]) -> Vec<Chunk> {
        let chunks = match lines {
            [] => Vec::new(),
            [only] if only.as_ref().is_empty() => Vec::new(),
            _ => pack_lines(lines.iter().map(AsRef::as_ref), self.budget),
        };
        self.report(&chunks);
        chunks
    }

    /// Full payloads (`extra` + chunk) ready to send
    #[must_use]
    pub fn payloads(&self, chunks: &[Chunk]) -> Vec<String> {
        chunks.iter().map(|c| c.with_context(&self.extra)).collect()
    }

    fn report(&self, chunks: &[Chunk]) {
        self.metrics.record_chunks(chunks.len());
        tracing::debug!(chunks = chunks.len(), budget = self.budget, "chunked text");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packs_until_budget_exceeded() {
        let chunks = chunk_text("aaaa\nbbbb\ncccc\ndddd", "", 18).unwrap();
        let texts: Vec<&str> = chunks.iter().map(Chunk::as_str).collect();
        assert_eq!(texts, vec!["aaaa\nbbbb\ncccc", "dddd"]);
    }

    #[test]
    fn test_exact_fit_stays_in_one_chunk() {
        // 4 * 4 characters + 3 separators = 19
        let chunks = chunk_text("aaaa\nbbbb\ncccc\ndddd", "", 19).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_size_twenty_keeps_four_short_lines_together() {
        // Joined length 19 is within 20, so nothing is split
        let chunks = chunk_lines(["aaaa", "bbbb", "cccc", "dddd"], "", 20).unwrap();
        let texts: Vec<&str> = chunks.iter().map(Chunk::as_str).collect();
        assert_eq!(texts, vec!["aaaa\nbbbb\ncccc\ndddd"]);
    }

    #[test]
    fn test_extra_is_reserved() {
        let chunks = chunk_text("aaaa\nbbbb\ncccc\ndddd", "ctx:", 17).unwrap();
        let texts: Vec<&str> = chunks.iter().map(Chunk::as_str).collect();
        assert_eq!(texts, vec!["aaaa\nbbbb", "cccc\ndddd"]);
        for chunk in &chunks {
            assert!(chunk.with_context("ctx:").chars().count() <= 17);
        }
    }

    #[test]
    fn test_extra_filling_chunk_is_config_error() {
        assert!(matches!(chunk_text("a", "abcd", 4), Err(ChatError::Config(_))));
        assert!(matches!(chunk_text("a", "", 0), Err(ChatError::Config(_))));
        assert!(Chunker::with_extra(3, "abc").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("", "", 10).unwrap().is_empty());
        assert!(chunk_lines(Vec::<String>::new(), "", 10).unwrap().is_empty());
        assert!(chunk_lines([""], "", 10).unwrap().is_empty());
    }

    #[test]
    fn test_oversized_line_is_sliced() {
        let chunks = chunk_text("ab\ncdefghij\nk", "", 4).unwrap();
        let texts: Vec<&str> = chunks.iter().map(Chunk::as_str).collect();
        assert_eq!(texts, vec!["ab", "cdef", "ghij", "k"]);
        assert!(!chunks[0].ends_mid_line());
        assert!(chunks[1].ends_mid_line());
        assert!(!chunks[2].ends_mid_line());
        assert_eq!(join_chunks(&chunks), "ab\ncdefghij\nk");
    }

    #[test]
    fn test_multibyte_slices_on_char_boundaries() {
        let chunks = chunk_text("ééééé", "", 2).unwrap();
        let texts: Vec<&str> = chunks.iter().map(Chunk::as_str).collect();
        assert_eq!(texts, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn test_trailing_newline_round_trips() {
        let chunks = chunk_text("one\ntwo\n", "", 100).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(join_chunks(&chunks), "one\ntwo\n");
    }

    #[test]
    fn test_chunker_payloads() {
        let chunker = Chunker::with_extra(12, "ctx\n").unwrap();
        assert_eq!(chunker.budget(), 8);
        let chunks = chunker.chunk_lines(&["abc", "def", "ghi"]);
        assert_eq!(chunker.payloads(&chunks), vec!["ctx\nabc\ndef", "ctx\nghi"]);
    }
}
