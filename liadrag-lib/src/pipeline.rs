//! Offline index build
//!
//! ```text
//! documents -> chunker -> chunks -> batched embedder -> slots -> failure policy -> VectorIndex
//! ```
//!
//! Nothing is written to disk unless the whole build succeeds.

use std::path::Path;

use tracing::{info, warn};

use crate::chunk::{chunk_corpus, Chunk, Chunker};
use crate::corpus::Document;
use crate::embed::{BatchEmbedder, Embedding, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::{Error, Result};

/// What to do with chunks whose embedding batch failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the build if any chunk is missing its embedding.
    #[default]
    Abort,
    /// Drop failed chunks together with their slots, keeping both lists aligned.
    Compact,
}

/// Chunks the corpus, embeds every chunk and builds the index.
pub struct IndexBuilder<'a, C: Chunker + ?Sized, P: EmbeddingProvider> {
    chunker: &'a C,
    embedder: &'a BatchEmbedder<P>,
    policy: FailurePolicy,
}

impl<'a, C: Chunker + ?Sized, P: EmbeddingProvider> IndexBuilder<'a, C, P> {
    #[must_use]
    pub fn new(chunker: &'a C, embedder: &'a BatchEmbedder<P>) -> Self {
        Self {
            chunker,
            embedder,
            policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build an in-memory index from `documents`.
    pub async fn build(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunks = chunk_corpus(self.chunker, documents);
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            chunker = self.chunker.name(),
            "corpus chunked"
        );
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus(format!(
                "{} documents produced no chunks",
                documents.len()
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let slots = self.embedder.embed_all(&texts).await;
        let (chunks, embeddings) = align(chunks, slots, self.policy)?;

        let index = VectorIndex::build(chunks, embeddings)?;
        info!(chunks = index.len(), dimension = index.dimension(), "index built");
        Ok(index)
    }

    /// Build an index and persist it to `dir`. Nothing is written on failure.
    pub async fn build_and_save(&self, documents: &[Document], dir: &Path) -> Result<VectorIndex> {
        let index = self.build(documents).await?;
        index.save(dir)?;
        Ok(index)
    }
}

/// Pair chunks with their embedding slots according to `policy`.
pub fn align(
    chunks: Vec<Chunk>,
    slots: Vec<Option<Embedding>>,
    policy: FailurePolicy,
) -> Result<(Vec<Chunk>, Vec<Embedding>)> {
    if chunks.len() != slots.len() {
        return Err(Error::InvalidInput(format!(
            "{} chunks but {} embedding slots",
            chunks.len(),
            slots.len()
        )));
    }

    let failed = slots.iter().filter(|s| s.is_none()).count();
    if failed == 0 {
        return Ok((chunks, slots.into_iter().flatten().collect()));
    }

    match policy {
        FailurePolicy::Abort => Err(Error::Provider(format!(
            "{failed} of {} chunks could not be embedded",
            chunks.len()
        ))),
        FailurePolicy::Compact => {
            warn!(failed, total = chunks.len(), "dropping chunks without embeddings");
            let (kept_chunks, kept_vectors): (Vec<Chunk>, Vec<Embedding>) = chunks
                .into_iter()
                .zip(slots)
                .filter_map(|(chunk, slot)| slot.map(|v| (chunk, v)))
                .unzip();
            if kept_chunks.is_empty() {
                return Err(Error::EmptyCorpus("every chunk failed to embed".to_string()));
            }
            Ok((kept_chunks, kept_vectors))
        }
    }
}
