//! Error type shared by every pdfqa component.

use thiserror::Error;

/// Result type alias using [`RagError`].
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors raised while ingesting documents or answering questions.
///
/// Ingestion-time variants (`EmptyUpload`, `DocumentParse`, `EmptyIndex`,
/// `IndexMismatch`) always reach the caller. Query-time variants
/// (`Embedding`, `Synthesis`, `DimensionMismatch`) are absorbed by the engine's
/// bare-question fallback unless that fallback fails too.
#[derive(Debug, Error)]
pub enum RagError {
    /// No files were given to ingest.
    #[error("No files uploaded")]
    EmptyUpload,

    /// A file could not be read as a PDF.
    #[error("Failed to parse '{file}': {reason}")]
    DocumentParse { file: String, reason: String },

    /// None of the uploaded pages contained extractable text.
    #[error("No extractable text found in the uploaded documents")]
    EmptyIndex,

    /// Records and vectors handed to the index differ in length.
    #[error("Cannot build index from {records} records and {vectors} vectors")]
    IndexMismatch { records: usize, vectors: usize },

    /// A vector does not have the dimension the index was built with.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding service failed or was given blank text.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The language model failed to produce a completion.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The question was missing or blank.
    #[error("Question cannot be empty")]
    EmptyQuestion,
}

impl RagError {
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn parse(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentParse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::EmptyUpload => "empty_upload",
            RagError::DocumentParse { .. } => "document_parse",
            RagError::EmptyIndex | RagError::IndexMismatch { .. } => "empty_index",
            RagError::DimensionMismatch { .. } | RagError::Embedding(_) => "embedding",
            RagError::Synthesis(_) => "synthesis",
            RagError::EmptyQuestion => "empty_question",
        }
    }
}
