//! liadrag CLI - build and query a retrieval index
//!
//! # Commands
//!
//! ```bash
//! # Show how a document would be chunked
//! liadrag chunk data/contact.txt
//!
//! # Chunk, embed and persist every .txt file under data/
//! liadrag build --data-dir data --index-dir index
//!
//! # Print retrieved context as JSON ({"context": ...} or {"error": ...})
//! liadrag query "How do I contact LIADTECH?"
//!
//! # Retrieve context and generate an answer
//! liadrag ask "How do I contact LIADTECH?"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use liadrag_lib::{
    chunk::{Chunker, FixedSizeChunker, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP},
    corpus::read_corpus,
    embed::{
        BatchConfig, BatchEmbedder, Normalization, OpenAiProvider, DEFAULT_BATCH_SIZE,
        DEFAULT_CONCURRENCY, DEFAULT_EMBEDDING_MODEL, OPENAI_BASE_URL,
    },
    generate::{build_user_prompt, GenerationProvider, OpenAiChat, DEFAULT_CHAT_MODEL},
    index::VectorIndex,
    pipeline::{FailurePolicy, IndexBuilder},
    search::{Retriever, DEFAULT_TOP_K},
    service::{QueryRequest, QueryService},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for LIADTECH. Answer concisely \
using only the provided context. If the context does not contain the answer, refer the user to \
+33 633 324 384 or contact@liadtech.com.";

#[derive(Parser)]
#[command(name = "liadrag")]
#[command(about = "Build and query a retrieval index over crawled text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a document and show the windows
    Chunk {
        /// Input file to chunk
        input: PathBuf,

        #[command(flatten)]
        chunking: ChunkArgs,
    },

    /// Chunk, embed and persist an index for a corpus directory
    Build {
        /// Directory of .txt documents
        #[arg(long, env = "LIADRAG_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Directory the index artifacts are written to
        #[arg(long, env = "LIADRAG_INDEX_DIR", default_value = "index")]
        index_dir: PathBuf,

        /// What to do with chunks whose embedding failed
        #[arg(long, value_enum, default_value_t = PolicyArg::Abort)]
        on_failure: PolicyArg,

        #[command(flatten)]
        chunking: ChunkArgs,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Retrieve context for a question and print the service response as JSON
    Query {
        /// Question to retrieve context for
        query: String,

        /// Number of chunks to retrieve
        #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
        k: usize,

        /// Directory holding the index artifacts
        #[arg(long, env = "LIADRAG_INDEX_DIR", default_value = "index")]
        index_dir: PathBuf,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Retrieve context and generate an answer
    Ask {
        /// Question to answer
        query: String,

        /// Number of chunks to retrieve
        #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
        k: usize,

        /// Directory holding the index artifacts
        #[arg(long, env = "LIADRAG_INDEX_DIR", default_value = "index")]
        index_dir: PathBuf,

        /// Chat model used for the answer
        #[arg(long, env = "LIADRAG_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
        chat_model: String,

        /// System prompt for the chat model
        #[arg(long, env = "LIADRAG_SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
        system_prompt: String,

        #[command(flatten)]
        provider: ProviderArgs,
    },
}

#[derive(Args)]
struct ChunkArgs {
    /// Window size in characters
    #[arg(long, env = "LIADRAG_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    size: usize,

    /// Overlap between adjacent windows in characters
    #[arg(long, env = "LIADRAG_CHUNK_OVERLAP", default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,
}

#[derive(Args)]
struct ProviderArgs {
    /// API key for the OpenAI-compatible provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "LIADRAG_OPENAI_BASE", default_value = OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Embedding model identifier
    #[arg(long, env = "LIADRAG_EMBED_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embed_model: String,

    /// Texts per embedding request
    #[arg(long, env = "LIADRAG_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Embedding requests in flight at once
    #[arg(long, env = "LIADRAG_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Seconds before a provider call is abandoned
    #[arg(long, env = "LIADRAG_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Keep provider vectors as-is and rank by raw dot product
    #[arg(long)]
    raw_vectors: bool,
}

impl ProviderArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    fn embedder(&self) -> Result<BatchEmbedder<OpenAiProvider>> {
        let provider = OpenAiProvider::new(
            &self.openai_api_key,
            &self.openai_base_url,
            self.embed_model.as_str(),
            self.timeout(),
        )?;
        let config = BatchConfig {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            timeout: Some(self.timeout()),
            normalization: if self.raw_vectors {
                Normalization::Raw
            } else {
                Normalization::Unit
            },
        };
        Ok(BatchEmbedder::new(provider, config)?)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Fail the build
    Abort,
    /// Drop failed chunks and index the rest
    Skip,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Abort => FailurePolicy::Abort,
            PolicyArg::Skip => FailurePolicy::Compact,
        }
    }
}

fn load_index(dir: &Path) -> Result<Arc<VectorIndex>> {
    let index = VectorIndex::load(dir)
        .with_context(|| format!("cannot serve queries without an index in {}", dir.display()))?;
    Ok(Arc::new(index))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chunk { input, chunking } => {
            let chunker = FixedSizeChunker::new(chunking.size, chunking.overlap)?;
            let text = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let source = input.display().to_string();
            let chunks = chunker.chunk(&source, &text, 0);

            println!(
                "Chunked '{}' into {} chunks (size {}, overlap {}):\n",
                source,
                chunks.len(),
                chunker.chunk_size(),
                chunker.overlap()
            );
            for chunk in &chunks {
                let chars = chunk.text.chars().count();
                println!("--- Chunk {} (offset {}, {} chars) ---", chunk.id, chunk.metadata.position, chars);
                // Show preview (first 200 chars)
                let preview: String = chunk.text.chars().take(200).collect();
                println!("{}{}\n", preview, if chars > 200 { "..." } else { "" });
            }
        }

        Commands::Build {
            data_dir,
            index_dir,
            on_failure,
            chunking,
            provider,
        } => {
            let chunker = FixedSizeChunker::new(chunking.size, chunking.overlap)?;
            let embedder = provider.embedder()?;
            let documents = read_corpus(&data_dir)?;
            info!(documents = documents.len(), dir = %data_dir.display(), "corpus loaded");

            let index = IndexBuilder::new(&chunker, &embedder)
                .with_policy(on_failure.into())
                .build_and_save(&documents, &index_dir)
                .await?;
            println!(
                "Indexed {} chunks ({} dimensions) from {} documents into {}",
                index.len(),
                index.dimension(),
                documents.len(),
                index_dir.display()
            );
        }

        Commands::Query {
            query,
            k,
            index_dir,
            provider,
        } => {
            let index = load_index(&index_dir)?;
            let service = QueryService::new(Retriever::new(provider.embedder()?, index));
            let response = service.handle(&QueryRequest { query, k: Some(k) }).await;

            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.is_error() {
                std::process::exit(1);
            }
        }

        Commands::Ask {
            query,
            k,
            index_dir,
            chat_model,
            system_prompt,
            provider,
        } => {
            let index = load_index(&index_dir)?;
            let retriever = Retriever::new(provider.embedder()?, index);
            let chat = OpenAiChat::new(
                &provider.openai_api_key,
                &provider.openai_base_url,
                chat_model,
                provider.timeout(),
            )?;

            let context = retriever.context(&query, Some(k)).await?;
            info!(model = chat.model_name(), context_chars = context.len(), "generating answer");
            let answer = chat
                .generate(&system_prompt, &build_user_prompt(&context, &query))
                .await?;
            println!("{answer}");
        }
    }

    Ok(())
}
