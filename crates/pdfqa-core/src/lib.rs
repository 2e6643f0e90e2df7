//! # pdfqa Core
//!
//! Runtime-agnostic logic for pdfqa: page records, the embedder and
//! language-model seams, the in-memory vector index, the retrieval-augmented
//! answering engine, and the session store that binds them together.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. Concrete
//! embedding and language-model providers live in the `pdfqa` app crate and
//! are injected through the [`embedding::Embedder`] and
//! [`generation::LanguageModel`] traits.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Page records and answer shapes |
//! | [`error`] | The [`RagError`](error::RagError) type |
//! | [`embedding`] | Embedder trait and cosine similarity |
//! | [`generation`] | Language-model trait |
//! | [`index`] | Immutable in-memory vector index |
//! | [`engine`] | Retrieval, quality gate, and fallback |
//! | [`session`] | The single live engine binding |

pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod session;

pub use error::{RagError, Result};
