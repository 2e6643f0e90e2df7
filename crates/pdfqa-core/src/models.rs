//! Core data models used throughout pdfqa.
//!
//! These types represent the page records that flow from extraction into the
//! index, and the answers that flow back out of the engine.

use serde::Serialize;

/// The text of one non-blank PDF page.
///
/// `page_number` is 1-based and counts pages within `document` only, never
/// across several uploaded files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    /// Uploaded file name the page came from.
    pub document: String,
    /// 1-based page position within `document`.
    pub page_number: usize,
    /// Extracted page text, as returned by the PDF library.
    pub text: String,
}

impl PageRecord {
    pub fn new(document: impl Into<String>, page_number: usize, text: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            page_number,
            text: text.into(),
        }
    }

    /// Human-readable source tag, e.g. `"Page 3 (report.pdf)"`.
    pub fn tag(&self) -> String {
        format!("Page {} ({})", self.page_number, self.document)
    }
}

/// A page returned by [`VectorIndex::search`](crate::index::VectorIndex::search)
/// together with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPage {
    pub record: PageRecord,
    pub score: f32,
}

/// The outcome of answering a question, tagged by the branch that produced it.
///
/// | Variant | Produced when |
/// |---------|---------------|
/// | `Direct` | No document is loaded, or retrieval failed and the bare question was asked instead |
/// | `Retrieved` | The first-tier retrieval answer passed the quality gate |
/// | `Fallback` | The first-tier answer was too short and the detailed context prompt was used |
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerResult {
    Direct(String),
    Retrieved {
        answer: String,
        sources: Vec<PageRecord>,
    },
    Fallback {
        answer: String,
        sources: Vec<PageRecord>,
    },
}

impl AnswerResult {
    pub fn answer(&self) -> &str {
        match self {
            AnswerResult::Direct(answer) => answer,
            AnswerResult::Retrieved { answer, .. } | AnswerResult::Fallback { answer, .. } => {
                answer
            }
        }
    }

    /// Pages used by the branch that produced the answer; empty for `Direct`.
    pub fn sources(&self) -> &[PageRecord] {
        match self {
            AnswerResult::Direct(_) => &[],
            AnswerResult::Retrieved { sources, .. } | AnswerResult::Fallback { sources, .. } => {
                sources
            }
        }
    }

    /// Short machine-readable name of the branch: `direct`, `retrieved` or `fallback`.
    pub fn mode(&self) -> &'static str {
        match self {
            AnswerResult::Direct(_) => "direct",
            AnswerResult::Retrieved { .. } => "retrieved",
            AnswerResult::Fallback { .. } => "fallback",
        }
    }
}
