//! liadrag - retrieval-augmented generation over a crawled text corpus
//!
//! # Architecture
//!
//! ```text
//! Documents -> Chunker -> BatchEmbedder -> VectorIndex --save--> index/
//!                                                                  |
//! Query -> BatchEmbedder -> VectorIndex::search <------load--------+
//!                                  |
//!                              Retriever -> context -> GenerationProvider
//! ```
//!
//! # Example
//!
//! ```ignore
//! use liadrag_lib::{
//!     chunk::FixedSizeChunker,
//!     corpus::read_corpus,
//!     embed::{BatchConfig, BatchEmbedder, OpenAiProvider},
//!     index::VectorIndex,
//!     pipeline::IndexBuilder,
//!     search::Retriever,
//! };
//!
//! // Offline build
//! let documents = read_corpus(Path::new("data"))?;
//! let chunker = FixedSizeChunker::new(1000, 300)?;
//! let embedder = BatchEmbedder::new(provider, BatchConfig::default())?;
//! IndexBuilder::new(&chunker, &embedder)
//!     .build_and_save(&documents, Path::new("index"))
//!     .await?;
//!
//! // Online retrieval
//! let index = Arc::new(VectorIndex::load(Path::new("index"))?);
//! let retriever = Retriever::new(embedder, index);
//! let context = retriever.context("How do I contact LIADTECH?", None).await?;
//! ```

pub mod chunk;
pub mod corpus;
pub mod embed;
pub mod error;
pub mod generate;
pub mod index;
pub mod pipeline;
pub mod search;
pub mod service;

pub use error::{Error, ErrorKind, Result};
