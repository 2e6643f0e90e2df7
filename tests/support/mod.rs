//! Shared fixtures: hand-built PDFs and deterministic providers.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pdfqa::core::embedding::Embedder;
use pdfqa::core::engine::RetrievalParams;
use pdfqa::core::generation::{CompletionRequest, LanguageModel};
use pdfqa::core::{RagError, Result};
use pdfqa::ingest::Pipeline;

/// A PDF with one page per entry; an empty entry is a page with no text.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    // 1 catalog, 2 pages, 3 font, then (page, content) pairs from 4.
    let page_id = |i: usize| 4 + 2 * i;
    let content_id = |i: usize| 5 + 2 * i;

    let mut out = Vec::new();
    let mut offsets = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_id(i))).collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, text) in pages.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id(i),
                content_id(i)
            )
            .as_bytes(),
        );

        let stream = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text)
        };
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id(i),
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

const DIMS: usize = 256;

/// Bag-of-words embedder: each lowercase word hashes into one of 256 buckets.
pub struct WordEmbedder;

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMS as u64) as usize
}

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        v[bucket(&word.to_lowercase())] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "words"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| word_vector(t)).collect())
    }
}

/// Answers by echoing the prompt it was given, so tests can see what context
/// reached the model. Records every prompt.
#[derive(Default)]
pub struct EchoModel {
    pub prompts: Mutex<Vec<String>>,
}

impl EchoModel {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        Ok(format!("From what I was given: {}", request.prompt))
    }
}

/// Embedder that succeeds for the first `ok_calls` calls, then fails.
pub struct FlakyEmbedder {
    ok_calls: usize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(ok_calls: usize) -> Self {
        Self {
            ok_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
            return Err(RagError::embedding("service unavailable"));
        }
        Ok(texts.iter().map(|t| word_vector(t)).collect())
    }
}

/// Word vectors, but declares a different dimension than it returns.
pub struct MisdeclaredEmbedder;

#[async_trait]
impl Embedder for MisdeclaredEmbedder {
    fn model_name(&self) -> &str {
        "misdeclared"
    }

    fn dims(&self) -> usize {
        384
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| word_vector(t)).collect())
    }
}

pub fn pipeline_with(embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>) -> Pipeline {
    Pipeline {
        embedder,
        llm,
        params: RetrievalParams::default(),
        batch_size: 8,
    }
}

pub fn pipeline(llm: Arc<EchoModel>) -> Pipeline {
    pipeline_with(Arc::new(WordEmbedder), llm)
}
