//! Character-window text chunking with boundary-aware split points

use std::ops::Range;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, DocumentId, Metadata, META_CHUNK_INDEX, META_DOCUMENT_ID};

/// Split points, most preferred first. A chunk ends right after the separator.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// Text chunker with configurable size and overlap, both measured in characters.
///
/// Every chunk holds at most `chunk_size` characters and starts exactly
/// `overlap` characters before the end of the previous one. Split points
/// prefer paragraph, line, sentence, then word boundaries found in the back
/// half of the window, falling back to a hard cut.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker, rejecting `overlap >= chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Byte ranges of every window over `text`, in order.
    ///
    /// Windows cover the whole text; concatenating them after removing each
    /// window's overlap prefix reproduces the input.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }

        // offsets[i] is the byte offset of char i; the final entry is text.len()
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        let mut spans = Vec::new();
        let mut start = 0usize;

        loop {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                self.split_point(text, &offsets, start, hard_end)
            };

            spans.push(offsets[start]..offsets[end]);

            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        spans
    }

    /// Raw window texts; nothing when the text is blank.
    ///
    /// Whitespace-only windows inside the text are kept so neighbouring
    /// chunks still share exactly `overlap` characters.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.spans(text).into_iter().map(|range| &text[range]).collect()
    }

    /// Chunk a document's text, attaching `metadata` plus the document id and ordinal
    pub fn chunk(&self, document_id: DocumentId, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        self.chunks_from(document_id, text, metadata, 0)
    }

    /// Resume chunking at ordinal `from`; yields the same chunks a full run
    /// produces from that ordinal onwards
    pub fn chunks_from(
        &self,
        document_id: DocumentId,
        text: &str,
        metadata: &Metadata,
        from: u32,
    ) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .skip(from as usize)
            .map(|(ordinal, slice)| {
                let ordinal = ordinal as u32;
                let mut metadata = metadata.clone();
                metadata.insert(META_DOCUMENT_ID.into(), document_id.to_string().into());
                metadata.insert(META_CHUNK_INDEX.into(), ordinal.into());
                Chunk {
                    document_id,
                    ordinal,
                    text: slice.to_string(),
                    metadata,
                }
            })
            .collect()
    }

    /// Pick the char index ending a window that starts at `start` and may
    /// extend to `hard_end` (exclusive).
    fn split_point(&self, text: &str, offsets: &[usize], start: usize, hard_end: usize) -> usize {
        // A split must leave the chunk longer than the overlap, or the next
        // window would not advance.
        let min_end = start + (self.chunk_size / 2).max(self.overlap + 1);
        if min_end >= hard_end {
            return hard_end;
        }

        let window_start = offsets[min_end];
        let window = &text[window_start..offsets[hard_end]];

        for sep in SEPARATORS {
            if let Some(pos) = window.rfind(sep) {
                let split_byte = window_start + pos + sep.len();
                if let Ok(idx) = offsets.binary_search(&split_byte) {
                    return idx;
                }
            }
        }

        hard_end
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}
