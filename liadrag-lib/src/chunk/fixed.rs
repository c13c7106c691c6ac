use crate::chunk::{Chunker, Window};
use crate::{Error, Result};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between adjacent windows in characters.
pub const DEFAULT_OVERLAP: usize = 300;

/// Fixed-size chunker - splits by character count with overlap
///
/// Each window starts `chunk_size - overlap` characters after the previous one
/// and generation stops at the first window that reaches the end of the text.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    overlap: usize,
}

impl FixedSizeChunker {
    /// Create a chunker, rejecting `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl Chunker for FixedSizeChunker {
    fn name(&self) -> &str {
        "fixed"
    }

    fn windows<'a>(&self, content: &'a str) -> Box<dyn Iterator<Item = Window<'a>> + 'a> {
        Box::new(Windows {
            s: content,
            size: self.chunk_size,
            stride: self.stride(),
            byte_pos: 0,
            char_pos: 0,
            done: content.is_empty(),
        })
    }
}

/// Lazy window iterator over a document, always cutting on char boundaries.
struct Windows<'a> {
    s: &'a str,
    size: usize,
    stride: usize,
    byte_pos: usize,
    char_pos: usize,
    done: bool,
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.s[self.byte_pos..];
        let end = self.byte_pos + byte_offset_of_char(rest, self.size);
        let window = Window {
            offset: self.char_pos,
            text: &self.s[self.byte_pos..end],
        };

        if end == self.s.len() {
            self.done = true;
        } else {
            self.byte_pos += byte_offset_of_char(rest, self.stride);
            self.char_pos += self.stride;
        }
        Some(window)
    }
}

/// Byte offset of the `n`th char in `s`, or `s.len()` if it has fewer chars.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}
