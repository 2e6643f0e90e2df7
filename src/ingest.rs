//! Ingestion pipeline orchestration.
//!
//! Coordinates the full upload flow: extraction → embedding → index build →
//! session binding. The flow is all-or-nothing: any failure leaves the
//! session store exactly as it was.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use pdfqa_core::embedding::{embed_many, Embedder};
use pdfqa_core::engine::{RagEngine, RetrievalParams};
use pdfqa_core::generation::LanguageModel;
use pdfqa_core::index::VectorIndex;
use pdfqa_core::models::PageRecord;
use pdfqa_core::session::SessionStore;
use pdfqa_core::{RagError, Result};

use crate::extract::extract_pages;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Pages kept from one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub pages: usize,
}

/// What a successful ingestion indexed.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileSummary>,
    pub pages: usize,
}

impl IngestReport {
    pub fn message(&self) -> String {
        let names: Vec<&str> = self.files.iter().map(|f| f.name.as_str()).collect();
        format!(
            "Uploaded {} PDFs and processed {} pages ({})",
            self.files.len(),
            self.pages,
            names.join(", ")
        )
    }
}

/// The collaborators an ingestion binds into the new engine.
#[derive(Clone)]
pub struct Pipeline {
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LanguageModel>,
    pub params: RetrievalParams,
    pub batch_size: usize,
}

/// Extract every file's non-blank pages, in upload order.
///
/// Runs on the blocking pool. The first unreadable file aborts the whole
/// extraction with [`RagError::DocumentParse`] naming that file.
pub async fn extract_all(files: Vec<UploadedFile>) -> Result<(Vec<PageRecord>, Vec<FileSummary>)> {
    tokio::task::spawn_blocking(move || {
        let mut records = Vec::new();
        let mut summaries = Vec::with_capacity(files.len());
        for file in &files {
            let pages = extract_pages(&file.name, &file.bytes)?;
            info!(file = %file.name, pages = pages.len(), "extracted");
            summaries.push(FileSummary {
                name: file.name.clone(),
                pages: pages.len(),
            });
            records.extend(pages);
        }
        Ok::<_, RagError>((records, summaries))
    })
    .await
    .map_err(|e| RagError::parse("upload", format!("extraction task failed: {}", e)))?
}

/// Embed page texts in batches of `batch_size`, preserving order.
pub async fn embed_pages(
    embedder: &dyn Embedder,
    records: &[PageRecord],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(records.len());
    for batch in records.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        vectors.extend(embed_many(embedder, &texts).await?);
    }
    Ok(vectors)
}

/// Build a new engine from `files` and bind it in `store`, replacing any
/// previous one.
///
/// # Errors
///
/// - [`RagError::EmptyUpload`] when `files` is empty.
/// - [`RagError::DocumentParse`] when any file cannot be read.
/// - [`RagError::EmptyIndex`] when no page of any file has text.
/// - [`RagError::Embedding`] when the embedder fails.
/// - [`RagError::DimensionMismatch`] when the vectors are not the size the
///   embedder declares.
///
/// On error the store keeps its previous binding.
pub async fn ingest(
    files: Vec<UploadedFile>,
    pipeline: &Pipeline,
    store: &SessionStore,
) -> Result<IngestReport> {
    if files.is_empty() {
        return Err(RagError::EmptyUpload);
    }

    let (records, summaries) = extract_all(files).await?;
    if records.is_empty() {
        return Err(RagError::EmptyIndex);
    }

    let vectors = embed_pages(pipeline.embedder.as_ref(), &records, pipeline.batch_size).await?;
    let pages = records.len();
    let index = VectorIndex::build(records, vectors)?;
    if index.dims() != pipeline.embedder.dims() {
        warn!(
            model = pipeline.embedder.model_name(),
            configured = pipeline.embedder.dims(),
            returned = index.dims(),
            "embedding dimension differs from configuration; set embedding.dims"
        );
        return Err(RagError::DimensionMismatch {
            expected: pipeline.embedder.dims(),
            actual: index.dims(),
        });
    }
    info!(
        pages,
        dims = index.dims(),
        model = pipeline.embedder.model_name(),
        "index built"
    );

    store.set(RagEngine::new(
        index,
        Arc::clone(&pipeline.embedder),
        Arc::clone(&pipeline.llm),
        pipeline.params.clone(),
    ));

    Ok(IngestReport {
        files: summaries,
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_message_lists_files() {
        let report = IngestReport {
            files: vec![
                FileSummary {
                    name: "a.pdf".to_string(),
                    pages: 2,
                },
                FileSummary {
                    name: "b.pdf".to_string(),
                    pages: 1,
                },
            ],
            pages: 3,
        };
        assert_eq!(
            report.message(),
            "Uploaded 2 PDFs and processed 3 pages (a.pdf, b.pdf)"
        );
    }

    #[tokio::test]
    async fn corrupt_file_aborts_extraction() {
        let files = vec![UploadedFile::new("broken.pdf", b"%PDF-garbage".to_vec())];
        let err = extract_all(files).await.unwrap_err();
        assert!(matches!(err, RagError::DocumentParse { ref file, .. } if file == "broken.pdf"));
    }
}
