//! Immutable in-memory vector index.
//!
//! Vector search is brute-force cosine similarity over all stored vectors,
//! which is exact and fast enough for the tens to low hundreds of pages a
//! single upload produces. The index is never mutated after
//! [`VectorIndex::build`]; clearing a session drops the whole structure.

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{PageRecord, ScoredPage};

struct IndexedPage {
    record: PageRecord,
    vector: Vec<f32>,
}

/// A fully built set of embedded page records.
pub struct VectorIndex {
    pages: Vec<IndexedPage>,
    dims: usize,
}

impl VectorIndex {
    /// Pair every record with its vector.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if `records` is empty.
    /// - [`RagError::IndexMismatch`] if the two slices differ in length.
    /// - [`RagError::DimensionMismatch`] if the vectors do not all share one
    ///   non-zero dimension.
    pub fn build(records: Vec<PageRecord>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if records.len() != vectors.len() {
            return Err(RagError::IndexMismatch {
                records: records.len(),
                vectors: vectors.len(),
            });
        }
        if records.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let dims = vectors[0].len();
        if dims == 0 {
            return Err(RagError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RagError::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }

        let pages = records
            .into_iter()
            .zip(vectors)
            .map(|(record, vector)| IndexedPage { record, vector })
            .collect();

        Ok(Self { pages, dims })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always false for a built index; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &PageRecord> {
        self.pages.iter().map(|p| &p.record)
    }

    /// Return the `min(k, len)` pages most similar to `query`.
    ///
    /// Results are sorted by descending cosine similarity. Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPage>> {
        if query.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, p)| (i, cosine_similarity(query, &p.vector)))
            .collect();

        // scores are finite; sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredPage {
                record: self.pages[i].record.clone(),
                score,
            })
            .collect())
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("pages", &self.pages.len())
            .field("dims", &self.dims)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize) -> PageRecord {
        PageRecord::new("doc.pdf", n, format!("page {}", n))
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::build(
            vec![page(1), page(2), page(3), page(4)],
            vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.7, 0.7],
                vec![-1.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn build_rejects_empty_input() {
        let err = VectorIndex::build(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, RagError::EmptyIndex));
    }

    #[test]
    fn build_rejects_length_mismatch() {
        let err = VectorIndex::build(vec![page(1), page(2)], vec![vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            RagError::IndexMismatch {
                records: 2,
                vectors: 1
            }
        ));
    }

    #[test]
    fn build_rejects_ragged_vectors() {
        let err = VectorIndex::build(vec![page(1), page(2)], vec![vec![1.0, 0.0], vec![1.0]])
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn search_orders_by_similarity() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.1], 4).unwrap();
        let pages: Vec<usize> = results.iter().map(|r| r.record.page_number).collect();
        assert_eq!(pages, vec![1, 3, 2, 4]);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn search_returns_at_most_k() {
        let index = sample_index();
        assert_eq!(index.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 4);
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = VectorIndex::build(
            vec![page(1), page(2), page(3)],
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 0.0]],
        )
        .unwrap();
        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let pages: Vec<usize> = results.iter().map(|r| r.record.page_number).collect();
        assert_eq!(pages, vec![2, 3, 1]);
    }

    #[test]
    fn nan_vector_ranks_as_unrelated() {
        let index = VectorIndex::build(
            vec![page(1), page(2), page(3), page(4)],
            vec![
                vec![0.1, 0.0],
                vec![f32::NAN, 0.0],
                vec![1.0, 0.0],
                vec![0.5, 0.5],
            ],
        )
        .unwrap();
        let results = index.search(&[1.0, 0.0], 4).unwrap();
        let pages: Vec<usize> = results.iter().map(|r| r.record.page_number).collect();
        assert_eq!(pages, vec![1, 3, 4, 2]);
        assert!(results.iter().all(|r| r.score.is_finite()));
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn search_rejects_wrong_query_dimension() {
        let index = sample_index();
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
    }
}
