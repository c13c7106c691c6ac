//! Query-time retrieval
//!
//! Combines the batched embedder and a loaded index into context for generation.
//! Both are passed in explicitly; the index is shared read-only behind an `Arc`
//! so many queries can be served against one load.
//!
//! # Usage
//!
//! ```ignore
//! use liadrag_lib::search::Retriever;
//!
//! let index = Arc::new(VectorIndex::load(Path::new("index"))?);
//! let retriever = Retriever::new(embedder, index);
//! let context = retriever.context("How do I contact LIADTECH?", None).await?;
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::embed::{BatchEmbedder, EmbeddingProvider};
use crate::index::{SearchResult, VectorIndex};
use crate::{Error, Result};

/// Number of chunks retrieved when the caller does not say.
pub const DEFAULT_TOP_K: usize = 3;
/// Separator placed between retrieved chunk texts.
pub const DEFAULT_DELIMITER: &str = "\n\n";

/// Embeds queries, searches the index and assembles context.
pub struct Retriever<P: EmbeddingProvider> {
    embedder: BatchEmbedder<P>,
    index: Arc<VectorIndex>,
    default_k: usize,
    delimiter: String,
}

impl<P: EmbeddingProvider> Retriever<P> {
    /// Create a retriever with `k = 3` and a blank-line delimiter.
    #[must_use]
    pub fn new(embedder: BatchEmbedder<P>, index: Arc<VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            default_k: DEFAULT_TOP_K,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    #[must_use]
    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Top-k chunks for `query`, best first.
    ///
    /// Query embedding failures are returned as-is; they are never turned into an
    /// empty result.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<Vec<SearchResult>> {
        let k = k.unwrap_or(self.default_k);
        if k == 0 {
            return Err(Error::InvalidInput("k must be at least 1".to_string()));
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        let results = self.index.search(&query_embedding, k)?;
        debug!(
            k,
            hits = results.len(),
            top_score = results.first().map(|r| r.score),
            "query searched"
        );
        Ok(results)
    }

    /// Retrieved chunk texts joined in rank order.
    pub async fn context(&self, query: &str, k: Option<usize>) -> Result<String> {
        let results = self.retrieve(query, k).await?;
        Ok(self.assemble(&results))
    }

    /// Join result texts with the configured delimiter.
    #[must_use]
    pub fn assemble(&self, results: &[SearchResult]) -> String {
        results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.delimiter)
    }

    /// Returns a reference to the index.
    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Returns a reference to the embedder.
    #[must_use]
    pub fn embedder(&self) -> &BatchEmbedder<P> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkMetadata};
    use crate::embed::{BatchConfig, Embedding, Normalization};
    use async_trait::async_trait;

    /// Maps a query to a fixed direction by keyword; "offline" fails.
    struct KeywordProvider;

    #[async_trait]
    impl EmbeddingProvider for KeywordProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            texts
                .iter()
                .map(|t| match t.as_str() {
                    t if t.contains("offline") => Err(Error::Provider("connection refused".into())),
                    t if t.contains("contact") => Ok(vec![0.0, 1.0, 0.0]),
                    t if t.contains("price") => Ok(vec![0.0, 0.0, 1.0]),
                    _ => Ok(vec![1.0, 0.0, 0.0]),
                })
                .collect()
        }

        fn model_name(&self) -> &str {
            "keyword"
        }
    }

    fn make_chunk(id: usize, text: &str) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            metadata: ChunkMetadata::default(),
        }
    }

    fn retriever() -> Retriever<KeywordProvider> {
        let chunks = vec![
            make_chunk(0, "We build AI products."),
            make_chunk(1, "Call us on +33 633 324 384."),
            make_chunk(2, "Plans start at 99 EUR."),
            make_chunk(3, "Email contact@liadtech.com."),
        ];
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 0.8, 0.6],
        ];
        let index = Arc::new(VectorIndex::build(chunks, embeddings).unwrap());
        let config = BatchConfig {
            normalization: Normalization::Raw,
            ..BatchConfig::default()
        };
        Retriever::new(BatchEmbedder::new(KeywordProvider, config).unwrap(), index)
    }

    #[tokio::test]
    async fn test_default_k_is_three() {
        let results = retriever().retrieve("what do you do", None).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.id, 0);
    }

    #[tokio::test]
    async fn test_context_joins_in_rank_order() {
        let context = retriever().context("how to contact you", Some(2)).await.unwrap();
        assert_eq!(
            context,
            "Call us on +33 633 324 384.\n\nEmail contact@liadtech.com."
        );
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let retriever = retriever().with_delimiter("\n---\n").with_default_k(2);
        let context = retriever.context("price list", None).await.unwrap();
        assert_eq!(context, "Plans start at 99 EUR.\n---\nEmail contact@liadtech.com.");
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_surfaced() {
        let err = retriever().context("offline question", None).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let err = retriever().retrieve("anything", Some(0)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
