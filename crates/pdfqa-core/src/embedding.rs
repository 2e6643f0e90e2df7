//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus [`cosine_similarity`], the metric the vector index ranks by.
//!
//! Concrete providers (fastembed, OpenAI, Ollama) live in the `pdfqa` app
//! crate.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a fixed model configuration:
/// pages embedded at ingestion time and questions embedded at query time have
/// to land in the same vector space.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    ///
    /// Callers go through [`embed_many`] rather than calling this directly, so
    /// that blank inputs and short responses are rejected in one place.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = embed_many(self, &[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding("Empty embedding response"))
    }
}

/// Embed a batch of texts with input validation.
///
/// # Errors
///
/// - [`RagError::Embedding`] if any text is blank after trimming.
/// - [`RagError::Embedding`] if the provider returns a different number of
///   vectors than it was given texts.
/// - Whatever the provider itself returns.
pub async fn embed_many<E: Embedder + ?Sized>(embedder: &E, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(RagError::embedding(format!(
            "cannot embed blank text (input {})",
            pos
        )));
    }
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = embedder.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(RagError::embedding(format!(
            "{} returned {} vectors for {} texts",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    Ok(vectors)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, a zero
/// vector on either side, or a non-finite result (NaN or infinite components).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    let sim = dot / denom;
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}
