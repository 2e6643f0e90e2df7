//! The single live engine binding.
//!
//! A [`SessionStore`] holds at most one [`RagEngine`] (which owns its
//! [`VectorIndex`](crate::index::VectorIndex)). Readers clone the `Arc` and
//! drop the lock immediately, so a question keeps answering against the
//! engine it started with while a new ingestion swaps in its replacement.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::engine::RagEngine;

/// Process-wide holder of the current engine.
///
/// Single-tenant: every caller sees the same binding. Construct one per
/// server (or per test) and share it by reference or `Arc`.
#[derive(Default)]
pub struct SessionStore {
    current: RwLock<Option<Arc<RagEngine>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any existing binding with `engine`.
    pub fn set(&self, engine: RagEngine) {
        let pages = engine.index().len();
        let engine = Arc::new(engine);
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            guard.replace(engine)
        };
        info!(pages, replaced = previous.is_some(), "session bound");
    }

    /// Snapshot of the current binding, if any.
    pub fn get(&self) -> Option<Arc<RagEngine>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drop the binding. Returns whether one was present; clearing an empty
    /// store is a no-op.
    pub fn clear(&self) -> bool {
        let previous = self
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if previous.is_some() {
            info!("session cleared");
        }
        previous.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::engine::RetrievalParams;
    use crate::error::{RagError, Result};
    use crate::generation::{CompletionRequest, LanguageModel};
    use crate::index::VectorIndex;
    use crate::models::PageRecord;
    use async_trait::async_trait;

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        fn model_name(&self) -> &str {
            "null"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(RagError::embedding("unused"))
        }
    }

    struct NullModel;

    #[async_trait]
    impl LanguageModel for NullModel {
        fn model_name(&self) -> &str {
            "null"
        }
        async fn complete(&self, _request: CompletionRequest<'_>) -> Result<String> {
            Err(RagError::synthesis("unused"))
        }
    }

    fn engine_with_pages(n: usize) -> RagEngine {
        let records = (1..=n)
            .map(|i| PageRecord::new("doc.pdf", i, format!("page {}", i)))
            .collect();
        let vectors = (0..n).map(|_| vec![1.0]).collect();
        RagEngine::new(
            VectorIndex::build(records, vectors).unwrap(),
            Arc::new(NullEmbedder),
            Arc::new(NullModel),
            RetrievalParams::default(),
        )
    }

    #[test]
    fn new_store_is_empty() {
        let store = SessionStore::new();
        assert!(!store.is_ready());
        assert!(store.get().is_none());
    }

    #[test]
    fn set_then_get() {
        let store = SessionStore::new();
        store.set(engine_with_pages(2));
        assert!(store.is_ready());
        assert_eq!(store.get().unwrap().index().len(), 2);
    }

    #[test]
    fn set_replaces_previous_binding() {
        let store = SessionStore::new();
        store.set(engine_with_pages(1));
        store.set(engine_with_pages(3));
        assert_eq!(store.get().unwrap().index().len(), 3);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = SessionStore::new();
        assert!(!store.clear());
        store.set(engine_with_pages(1));
        assert!(store.clear());
        assert!(!store.clear());
        assert!(store.get().is_none());
    }

    #[test]
    fn snapshot_survives_clear() {
        let store = SessionStore::new();
        store.set(engine_with_pages(2));
        let snapshot = store.get().unwrap();
        store.clear();
        assert_eq!(snapshot.index().len(), 2);
        assert!(!store.is_ready());
    }
}
