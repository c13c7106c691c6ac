//! Answer generation from retrieved context
//!
//! A thin shim over a chat-completion service. Retrieval hands it a context
//! string; prompt wording belongs to the caller.

use async_trait::async_trait;

use crate::Result;

/// Trait for chat-style text generation services
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a reply to `user_prompt` under `system_prompt`.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

/// Frame retrieved context and the user's question as a single prompt.
#[must_use]
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!("Answer using the following context:\n\nContext:\n{context}\n\nQuestion: {question}")
}

mod openai;

pub use openai::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_context_and_question() {
        let prompt = build_user_prompt("Contact: +33 633 324 384.", "How do I reach you?");
        assert!(prompt.contains("Context:\nContact: +33 633 324 384."));
        assert!(prompt.ends_with("Question: How do I reach you?"));
    }
}
