//! Query-service entry point
//!
//! Request/response shapes for whatever transport fronts the retriever. A failed
//! query always produces an explicit error payload.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::embed::EmbeddingProvider;
use crate::error::ErrorKind;
use crate::search::Retriever;

/// Incoming query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

/// Either the assembled context or an error category with a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum QueryResponse {
    Context { context: String },
    Error { error: ErrorKind, message: String },
}

impl QueryResponse {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, QueryResponse::Error { .. })
    }
}

/// Answers [`QueryRequest`]s from a loaded index.
pub struct QueryService<P: EmbeddingProvider> {
    retriever: Retriever<P>,
}

impl<P: EmbeddingProvider> QueryService<P> {
    #[must_use]
    pub fn new(retriever: Retriever<P>) -> Self {
        Self { retriever }
    }

    pub async fn handle(&self, request: &QueryRequest) -> QueryResponse {
        match self.retriever.context(&request.query, request.k).await {
            Ok(context) => QueryResponse::Context { context },
            Err(e) => {
                warn!(error = %e, "query failed");
                QueryResponse::Error {
                    error: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever<P> {
        &self.retriever
    }
}
