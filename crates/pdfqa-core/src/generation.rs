//! Language-model seam.
//!
//! The engine only ever needs single-turn completion: one prompt in, one
//! piece of text out. Providers (Gemini, OpenAI, Ollama) implement
//! [`LanguageModel`] in the app crate; tests implement it with canned replies.

use async_trait::async_trait;

use crate::error::Result;

/// Request envelope shared by every provider.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(prompt: &'a str, temperature: f32) -> Self {
        Self {
            prompt,
            temperature,
        }
    }
}

/// A generative language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Produce a completion for the request.
    ///
    /// Failures, including timeouts, are reported as
    /// [`RagError::Synthesis`](crate::error::RagError::Synthesis).
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String>;
}
