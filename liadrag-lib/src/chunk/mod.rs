//! Document chunking
//!
//! Documents are cut into overlapping fixed-size windows before embedding. Every
//! chunk keeps a back-reference to the document it came from and its global
//! position in the corpus, which is also its position in the vector index.
//!
//! # Usage
//!
//! ```ignore
//! use liadrag_lib::chunk::{chunk_corpus, FixedSizeChunker};
//!
//! let chunker = FixedSizeChunker::new(1000, 300)?;
//! let chunks = chunk_corpus(&chunker, &documents);
//! ```

use serde::{Deserialize, Serialize};

use crate::corpus::Document;

/// A chunk of text with its metadata
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Chunk {
    /// Position in the global chunk ordering
    pub id: usize,
    /// The text content of this chunk
    pub text: String,
    /// Metadata about the source and position
    pub metadata: ChunkMetadata,
}

/// Metadata associated with a chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ChunkMetadata {
    /// Source document identifier
    pub source: String,
    /// Character offset of the chunk within the source document
    pub position: usize,
}

/// A borrowed slice of a document produced by a [`Chunker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    /// Character offset of the window within the document
    pub offset: usize,
    /// The window text
    pub text: &'a str,
}

/// Trait for document chunking strategies
pub trait Chunker: Send + Sync {
    /// Lazily split content into ordered windows.
    fn windows<'a>(&self, content: &'a str) -> Box<dyn Iterator<Item = Window<'a>> + 'a>;

    /// Returns the name of this chunking strategy
    fn name(&self) -> &str;

    /// Split a single document into chunks numbered from `first_id`.
    fn chunk(&self, source: &str, content: &str, first_id: usize) -> Vec<Chunk> {
        self.windows(content)
            .enumerate()
            .map(|(i, window)| Chunk {
                id: first_id + i,
                text: window.text.to_string(),
                metadata: ChunkMetadata {
                    source: source.to_string(),
                    position: window.offset,
                },
            })
            .collect()
    }
}

/// Chunk every document in order, assigning global ids `0..n`.
pub fn chunk_corpus<C: Chunker + ?Sized>(chunker: &C, documents: &[Document]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        let next = chunker.chunk(&doc.id, &doc.text, chunks.len());
        chunks.extend(next);
    }
    chunks
}

mod fixed;

pub use fixed::*;
