//! Exact inner-product vector index
//!
//! The index is built once from an aligned pair of chunk and vector lists and is
//! read-only afterwards. Any corpus change means building a new index and
//! replacing the old one wholesale.
//!
//! # Storage Model
//!
//! - Vectors: one contiguous row-major `f32` buffer, row `i` belongs to chunk `i`
//! - Chunks: the original text and metadata, in the same order
//!
//! Both are persisted side by side (see [`VectorIndex::save`]) and are always
//! loaded together.
//!
//! # Usage
//!
//! ```ignore
//! use liadrag_lib::index::VectorIndex;
//!
//! let index = VectorIndex::build(chunks, embeddings)?;
//! index.save(Path::new("index"))?;
//!
//! let index = VectorIndex::load(Path::new("index"))?;
//! let results = index.search(&query_embedding, 3)?;
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::chunk::Chunk;
use crate::embed::Embedding;
use crate::{Error, Result};

/// A search result with similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Inner product with the query (higher is more similar)
    pub score: f32,
}

/// Brute-force index over a fixed set of vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// Build an index from chunks and their embeddings, position for position.
    ///
    /// Fails with [`Error::EmptyCorpus`] when there is nothing to index and with
    /// [`Error::InvalidInput`] when the lists disagree in length or the vectors
    /// disagree in dimension.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Embedding>) -> Result<Self> {
        if chunks.is_empty() || embeddings.is_empty() {
            return Err(Error::EmptyCorpus("no chunks to index".to_string()));
        }
        if chunks.len() != embeddings.len() {
            return Err(Error::InvalidInput(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings[0].len();
        if dimension == 0 {
            return Err(Error::InvalidInput("embeddings have zero dimension".to_string()));
        }
        let mut vectors = Vec::with_capacity(dimension * embeddings.len());
        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                return Err(Error::InvalidInput(format!(
                    "embedding {i} has dimension {}, expected {dimension}",
                    embedding.len()
                )));
            }
            vectors.extend_from_slice(embedding);
        }

        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }

    /// Return the `k` most similar chunks, best first.
    ///
    /// Every stored vector is scored. Equal scores are ordered by position, so
    /// results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap = BinaryHeap::with_capacity(k.min(self.len()) + 1);
        for (pos, row) in self.vectors.chunks_exact(self.dimension).enumerate() {
            heap.push(Reverse(Candidate {
                score: inner_product(query, row),
                pos,
            }));
            if heap.len() > k {
                heap.pop();
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(c)| SearchResult {
                chunk: self.chunks[c.pos].clone(),
                score: c.score,
            })
            .collect())
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always `false` for a built or loaded index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Indexed chunks in index order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Vector stored at `pos`.
    #[must_use]
    pub fn vector(&self, pos: usize) -> Option<&[f32]> {
        self.vectors.chunks_exact(self.dimension).nth(pos)
    }
}

/// Scored position; greater means a better match.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    pos: usize,
}

impl Candidate {
    fn rank(&self) -> f32 {
        if self.score.is_nan() {
            f32::NEG_INFINITY
        } else {
            self.score
        }
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .total_cmp(&other.rank())
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Dot product of two equal-length vectors.
///
/// Equals cosine similarity only when both vectors are unit length.
fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

mod persist;

pub use persist::*;
