//! Retrieval-augmented answering.
//!
//! # Answering Algorithm
//!
//! 1. No engine bound → ask the language model the bare question.
//! 2. Embed the question and fetch the `top_k` most similar pages.
//! 3. Ask the model with the pages as context (first tier).
//! 4. If the trimmed answer is shorter than `min_answer_chars`, ask again with
//!    the detailed context prompt (second tier), reusing the pages from step 2.
//! 5. If any of steps 2–4 fails, ask the bare question instead.
//!
//! Only a failure of the bare question itself reaches the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::{CompletionRequest, LanguageModel};
use crate::index::VectorIndex;
use crate::models::{AnswerResult, PageRecord};
use crate::session::SessionStore;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    /// Number of pages retrieved per question.
    pub top_k: usize,
    /// Trimmed first-tier answers shorter than this trigger the second tier.
    pub min_answer_chars: usize,
    /// Sampling temperature for both retrieval tiers.
    pub rag_temperature: f32,
    /// Sampling temperature for bare-question answers.
    pub direct_temperature: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_answer_chars: 50,
            rag_temperature: 0.3,
            direct_temperature: 0.7,
        }
    }
}

/// An index bound to the models that answer questions over it.
pub struct RagEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    params: RetrievalParams,
}

impl RagEngine {
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            index: Arc::new(index),
            embedder,
            llm,
            params,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Answer a question against this engine's index.
    ///
    /// Never returns a retrieval or first/second-tier synthesis error: those
    /// degrade to [`answer_directly`]. Only a failure of that last call, or a
    /// blank question, is returned.
    pub async fn ask(&self, question: &str) -> Result<AnswerResult> {
        let question = validate_question(question)?;

        match self.answer_from_pages(question).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(error = %e, "retrieval failed, answering without documents");
                answer_directly(self.llm.as_ref(), question, self.params.direct_temperature).await
            }
        }
    }

    async fn answer_from_pages(&self, question: &str) -> Result<AnswerResult> {
        let query = self.embedder.embed(question).await?;
        let hits = self.index.search(&query, self.params.top_k)?;
        debug!(
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved pages"
        );

        let sources: Vec<PageRecord> = hits.into_iter().map(|h| h.record).collect();
        let context = build_context(&sources);

        let prompt = retrieval_prompt(&context, question);
        let candidate = self
            .llm
            .complete(CompletionRequest::new(&prompt, self.params.rag_temperature))
            .await?;
        let candidate = candidate.trim();

        if passes_quality_gate(candidate, self.params.min_answer_chars) {
            info!(mode = "retrieved", sources = sources.len(), "answered");
            return Ok(AnswerResult::Retrieved {
                answer: candidate.to_string(),
                sources,
            });
        }

        debug!(
            chars = candidate.chars().count(),
            min = self.params.min_answer_chars,
            "first-tier answer too short, using detailed prompt"
        );
        let prompt = detailed_prompt(&context, question);
        let detailed = self
            .llm
            .complete(CompletionRequest::new(&prompt, self.params.rag_temperature))
            .await?;

        info!(mode = "fallback", sources = sources.len(), "answered");
        Ok(AnswerResult::Fallback {
            answer: detailed.trim().to_string(),
            sources,
        })
    }
}

impl std::fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("index", &self.index)
            .field("embedder", &self.embedder.model_name())
            .field("llm", &self.llm.model_name())
            .field("params", &self.params)
            .finish()
    }
}

/// Answer whatever engine is currently bound in `store`, or the bare question
/// when none is.
///
/// The binding is read once; the question is then answered against that
/// snapshot even if the store is cleared or replaced meanwhile.
pub async fn ask(
    store: &SessionStore,
    llm: &dyn LanguageModel,
    direct_temperature: f32,
    question: &str,
) -> Result<AnswerResult> {
    let question = validate_question(question)?;
    match store.get() {
        Some(engine) => engine.ask(question).await,
        None => answer_directly(llm, question, direct_temperature).await,
    }
}

/// Ask the model the bare question with no document context.
pub async fn answer_directly(
    llm: &dyn LanguageModel,
    question: &str,
    temperature: f32,
) -> Result<AnswerResult> {
    let answer = llm
        .complete(CompletionRequest::new(question, temperature))
        .await?;
    info!(mode = "direct", "answered");
    Ok(AnswerResult::Direct(answer.trim().to_string()))
}

fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(RagError::EmptyQuestion);
    }
    Ok(trimmed)
}

/// True when a trimmed answer is long enough to return as-is.
///
/// Length is counted in characters, so 49 fails and 50 passes the default gate.
pub fn passes_quality_gate(answer: &str, min_chars: usize) -> bool {
    let answer = answer.trim();
    !answer.is_empty() && answer.chars().count() >= min_chars
}

/// Concatenate page texts in retrieval order, separated by blank lines.
pub fn build_context(pages: &[PageRecord]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First-tier prompt: answer from the context, admit when it does not say.
pub fn retrieval_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {context}\n\n\
         Question: {question}\n\
         Helpful Answer:"
    )
}

/// Second-tier prompt: ask explicitly for a detailed, context-based answer.
pub fn detailed_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context from the document, answer the question accurately and in detail.\n\n\
         Context:\n\
         {context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Embeds "sky" questions and pages along one axis, everything else along another.
    struct AxisEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(RagError::embedding("service unavailable"));
            }
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("sky") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    /// Replies from a queue and records every prompt it sees.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            let mut replies = replies;
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(RagError::synthesis("no scripted reply left")))
        }
    }

    fn engine(embedder_fails: bool, llm: Arc<ScriptedModel>) -> RagEngine {
        let index = VectorIndex::build(
            vec![
                PageRecord::new("doc.pdf", 1, "Grass is green."),
                PageRecord::new("doc.pdf", 2, "The sky is blue."),
            ],
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
        )
        .unwrap();
        RagEngine::new(
            index,
            Arc::new(AxisEmbedder {
                fail: embedder_fails,
            }),
            llm,
            RetrievalParams {
                top_k: 1,
                ..RetrievalParams::default()
            },
        )
    }

    fn chars(n: usize) -> String {
        "x".repeat(n)
    }

    #[test]
    fn quality_gate_boundary() {
        assert!(!passes_quality_gate(&chars(49), 50));
        assert!(passes_quality_gate(&chars(50), 50));
        assert!(!passes_quality_gate(&format!("  {}  \n", chars(49)), 50));
        assert!(!passes_quality_gate("   ", 0));
    }

    #[test]
    fn quality_gate_counts_characters_not_bytes() {
        assert!(passes_quality_gate(&"é".repeat(50), 50));
        assert!(!passes_quality_gate(&"é".repeat(49), 50));
    }

    #[test]
    fn context_keeps_retrieval_order() {
        let pages = vec![
            PageRecord::new("a.pdf", 2, "second"),
            PageRecord::new("a.pdf", 1, "first"),
        ];
        assert_eq!(build_context(&pages), "second\n\nfirst");
    }

    #[tokio::test]
    async fn long_first_tier_answer_is_retrieved() {
        let answer = format!("The sky is blue. {}", chars(40));
        let llm = ScriptedModel::new(vec![Ok(answer.clone())]);
        let result = engine(false, llm.clone()).ask("What color is the sky?").await.unwrap();

        assert_eq!(result.mode(), "retrieved");
        assert_eq!(result.answer(), answer);
        assert_eq!(result.sources().len(), 1);
        assert_eq!(result.sources()[0].page_number, 2);
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The sky is blue."));
        assert!(prompts[0].ends_with("Question: What color is the sky?\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn short_first_tier_answer_uses_detailed_prompt() {
        let llm = ScriptedModel::new(vec![
            Ok(chars(49)),
            Ok("  The sky is blue because of Rayleigh scattering.  ".to_string()),
        ]);
        let result = engine(false, llm.clone()).ask("What color is the sky?").await.unwrap();

        assert_eq!(result.mode(), "fallback");
        assert_eq!(
            result.answer(),
            "The sky is blue because of Rayleigh scattering."
        );
        assert_eq!(result.sources()[0].page_number, 2);
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].starts_with("Based on the following context"));
        assert!(prompts[1].contains("Context:\nThe sky is blue."));
    }

    #[tokio::test]
    async fn exactly_fifty_characters_is_accepted() {
        let llm = ScriptedModel::new(vec![Ok(chars(50))]);
        let result = engine(false, llm.clone()).ask("sky?").await.unwrap();
        assert_eq!(result.mode(), "retrieved");
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_bare_question() {
        let llm = ScriptedModel::new(vec![Ok("It is blue.".to_string())]);
        let result = engine(true, llm.clone()).ask("What color is the sky?").await.unwrap();

        assert_eq!(result, AnswerResult::Direct("It is blue.".to_string()));
        assert_eq!(llm.prompts(), vec!["What color is the sky?".to_string()]);
    }

    #[tokio::test]
    async fn synthesis_failure_degrades_to_bare_question() {
        let llm = ScriptedModel::new(vec![
            Err(RagError::synthesis("timeout")),
            Ok("Blue.".to_string()),
        ]);
        let result = engine(false, llm.clone()).ask("What color is the sky?").await.unwrap();
        assert_eq!(result, AnswerResult::Direct("Blue.".to_string()));
    }

    #[tokio::test]
    async fn second_tier_failure_degrades_to_bare_question() {
        let llm = ScriptedModel::new(vec![
            Ok(String::new()),
            Err(RagError::synthesis("quota")),
            Ok("Blue.".to_string()),
        ]);
        let result = engine(false, llm.clone()).ask("sky?").await.unwrap();
        assert_eq!(result.mode(), "direct");
        assert_eq!(llm.prompts().len(), 3);
    }

    #[tokio::test]
    async fn bare_question_failure_is_surfaced() {
        let llm = ScriptedModel::new(vec![
            Err(RagError::synthesis("down")),
            Err(RagError::synthesis("still down")),
        ]);
        let err = engine(false, llm).ask("sky?").await.unwrap_err();
        assert!(matches!(err, RagError::Synthesis(msg) if msg == "still down"));
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_any_call() {
        let llm = ScriptedModel::new(vec![]);
        let err = engine(false, llm.clone()).ask("  ").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyQuestion));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn empty_store_answers_directly() {
        let store = SessionStore::new();
        let llm = ScriptedModel::new(vec![Ok("4".to_string())]);
        let result = ask(&store, llm.as_ref(), 0.7, "What is 2+2?").await.unwrap();
        assert_eq!(result, AnswerResult::Direct("4".to_string()));
        assert!(result.sources().is_empty());
    }

    #[tokio::test]
    async fn bound_store_uses_the_engine() {
        let store = SessionStore::new();
        let llm = ScriptedModel::new(vec![Ok(format!("blue {}", chars(60)))]);
        store.set(engine(false, llm.clone()));
        let result = ask(&store, llm.as_ref(), 0.7, "What color is the sky?")
            .await
            .unwrap();
        assert_eq!(result.mode(), "retrieved");
    }
}
