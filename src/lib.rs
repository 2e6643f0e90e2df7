//! # pdfqa
//!
//! Ask questions about uploaded PDFs. Pages are extracted, embedded, and
//! indexed in memory; questions are answered by retrieval-augmented
//! generation, falling back to the bare language model when no document is
//! loaded or retrieval fails.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract  │──▶│   Embed     │──▶│ VectorIndex  │
//! │ (PDFs)   │   │ per page │   │ (provider)  │   │  in memory   │
//! └──────────┘   └──────────┘   └─────────────┘   └──────┬───────┘
//!                                                        ▼
//!                 ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//!                 │ Question │──▶│ SessionStore│──▶│  RagEngine   │──▶ answer
//!                 └──────────┘   └─────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GOOGLE_API_KEY=...
//! pdfqa serve                                  # HTTP API on 127.0.0.1:8000
//! pdfqa ask "What is this about?" --pdf a.pdf  # one-shot from the CLI
//! pdfqa pages a.pdf                            # inspect extracted pages
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`embedding`] | Embedding providers (local, OpenAI, Ollama) |
//! | [`llm`] | Language-model providers (Gemini, OpenAI, Ollama) |
//! | [`ingest`] | Upload → index → session pipeline |
//! | [`server`] | HTTP JSON API |
//!
//! The index, answering engine, and session store live in `pdfqa-core`,
//! re-exported here as [`core`].

pub use pdfqa_core as core;

pub mod config;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod server;

use anyhow::Result;

use crate::config::Config;
use crate::ingest::Pipeline;

/// Build the embedder and language model named in `config`.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    Ok(Pipeline {
        embedder: embedding::create_embedder(&config.embedding)?,
        llm: llm::create_language_model(&config.llm)?,
        params: config.retrieval.params(),
        batch_size: config.embedding.batch_size,
    })
}
