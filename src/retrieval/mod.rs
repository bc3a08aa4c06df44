//! Evidence retrieval over the support index.
//!
//! # Ranking
//!
//! The only metric is cosine similarity (dot product of unit vectors). Support entries
//! are stored normalized; query vectors are normalized here. A support entry's score is
//! its best similarity over all query patches.
//!
//! Ordering everywhere is similarity descending, then insertion sequence ascending, so
//! identical inputs always produce identical output.
//!
//! # Selection
//!
//! 1. per class, keep the top `max_patches_per_class` candidates
//! 2. merge the per-class subsets, re-rank, truncate to `k`
//!
//! Class scores are means over the step-1 subsets and are therefore independent of `k`.

pub mod error;
pub mod types;


pub use error::{RetrievalError, RetrievalResult};
pub use types::{ClassScores, EvidenceItem, EvidenceSummary, RetrievalOutcome, RetrievalParams};

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::constants::DimConfig;
use crate::embedding::l2_normalize;
use crate::index::{IndexSnapshot, SupportEntry};

/// Ranks support entries against query patch embeddings.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceRetriever {
    dims: DimConfig,
}

impl EvidenceRetriever {
    pub fn new(dims: DimConfig) -> Self {
        Self { dims }
    }

    /// Selects evidence and computes class scores from a consistent index snapshot.
    pub fn retrieve(
        &self,
        snapshot: &IndexSnapshot,
        queries: &[Vec<f32>],
        params: RetrievalParams,
    ) -> RetrievalResult<RetrievalOutcome> {
        if snapshot.is_empty() {
            return Err(RetrievalError::EmptySupportSet);
        }
        let queries = self.prepare_queries(queries)?;

        let mut merged: Vec<EvidenceItem> = Vec::new();
        let mut scores = Vec::with_capacity(snapshot.labels().len());

        for (label, entries) in snapshot.groups() {
            let mut ranked: Vec<EvidenceItem> = entries
                .iter()
                .map(|entry| best_match(entry, &queries))
                .collect();
            ranked.sort_by(rank_order);
            ranked.truncate(params.max_patches_per_class);

            let score = if ranked.is_empty() {
                0.0
            } else {
                ranked.iter().map(|e| e.similarity).sum::<f32>() / ranked.len() as f32
            };

            debug!(
                label = %label,
                available = entries.len(),
                selected = ranked.len(),
                score,
                "Class subset selected"
            );

            scores.push((label.clone(), score));
            merged.extend(ranked);
        }

        merged.sort_by(rank_order);
        let merged_candidates = merged.len();
        merged.truncate(params.k);

        Ok(RetrievalOutcome {
            evidence: merged,
            class_scores: ClassScores::from_ordered(scores),
            merged_candidates,
        })
    }

    fn prepare_queries(&self, queries: &[Vec<f32>]) -> RetrievalResult<Vec<Vec<f32>>> {
        if queries.is_empty() {
            return Err(RetrievalError::NoQueryPatches);
        }

        queries
            .iter()
            .enumerate()
            .map(|(index, q)| {
                if q.len() != self.dims.embedding_dim {
                    return Err(RetrievalError::DimensionMismatch {
                        expected: self.dims.embedding_dim,
                        actual: q.len(),
                    });
                }
                if q.iter().any(|x| !x.is_finite()) {
                    return Err(RetrievalError::NonFiniteQuery { index });
                }
                let mut q = q.clone();
                l2_normalize(&mut q);
                Ok(q)
            })
            .collect()
    }
}

/// Best similarity of `entry` over all queries; the earliest query wins ties.
fn best_match(entry: &Arc<SupportEntry>, queries: &[Vec<f32>]) -> EvidenceItem {
    let mut best = (f32::NEG_INFINITY, 0usize);
    for (i, q) in queries.iter().enumerate() {
        let sim = dot(q, &entry.embedding);
        if sim > best.0 {
            best = (sim, i);
        }
    }

    EvidenceItem {
        entry: Arc::clone(entry),
        similarity: best.0,
        query_patch: best.1,
    }
}

fn rank_order(a: &EvidenceItem, b: &EvidenceItem) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.entry.seq.cmp(&b.entry.seq))
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
