//! Text embedding through a remote provider
//!
//! The provider is a black box with a single call shape: an ordered list of texts
//! goes in, one vector per text comes back in the same order. [`BatchEmbedder`]
//! fans a large input out over bounded concurrent provider calls and puts every
//! vector back at the position of its text.
//!
//! # Similarity semantics
//!
//! The index ranks by inner product. With [`Normalization::Unit`] (the default)
//! every vector is scaled to unit length here, so inner product is cosine
//! similarity. [`Normalization::Raw`] keeps provider vectors as-is and search
//! ranks by the raw dot product.
//!
//! # Usage
//!
//! ```ignore
//! use liadrag_lib::embed::{BatchConfig, BatchEmbedder, OpenAiProvider};
//!
//! let provider = OpenAiProvider::new(&api_key, OPENAI_BASE_URL, "text-embedding-3-small", timeout)?;
//! let embedder = BatchEmbedder::new(provider, BatchConfig::default())?;
//!
//! // One slot per input text, `None` where the batch failed
//! let slots = embedder.embed_all(&texts).await;
//!
//! // Single query, errors propagated
//! let query = embedder.embed_query("How do I contact LIADTECH?").await?;
//! ```

use async_trait::async_trait;

use crate::Result;

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for remote embedding services
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed an ordered batch of texts with the configured model.
    ///
    /// Implementations must return exactly one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

/// How vectors are post-processed before indexing and querying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Normalization {
    /// Scale to unit L2 norm so inner product equals cosine similarity.
    #[default]
    Unit,
    /// Keep provider output unchanged; search ranks by raw dot product.
    Raw,
}

impl Normalization {
    /// Apply this normalization in place.
    pub fn apply(self, v: &mut [f32]) {
        if self == Normalization::Raw {
            return;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 && norm.is_finite() {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
    }
}

mod batch;
mod openai;

pub use batch::*;
pub use openai::*;
pub(crate) use openai::build_client;
