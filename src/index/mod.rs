//! In-memory support index.
//!
//! Holds support-patch embeddings grouped by class label. One `RwLock` guards the whole
//! table: ingestion takes the write lock, so concurrent readers observe an ingestion
//! either completely or not at all.
//!
//! # Re-ingestion policy
//!
//! The key is `(label, PatchId)`. Ingesting an existing key **replaces** its embedding
//! and keeps the entry's original insertion sequence, so its tie-break rank is stable.

pub mod error;
pub mod types;


pub use error::IndexError;
pub use types::{ClassLabel, IngestOutcome, LabelSet, SupportEntry};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::constants::{DimConfig, validate_embedding_dim};
use crate::embedding::l2_normalize;
use crate::patch::{Patch, PatchId};

struct IndexState {
    /// Entries per label, indexed by label position, in insertion order.
    by_label: Vec<Vec<Arc<SupportEntry>>>,
    /// `(label position, patch id)` -> offset into `by_label[label position]`.
    slots: HashMap<(usize, PatchId), usize>,
    next_seq: u64,
}

impl IndexState {
    fn empty(label_count: usize) -> Self {
        Self {
            by_label: vec![Vec::new(); label_count],
            slots: HashMap::new(),
            next_seq: 0,
        }
    }

    fn len(&self) -> usize {
        self.by_label.iter().map(Vec::len).sum()
    }

    fn apply(
        &mut self,
        label_pos: usize,
        label: &ClassLabel,
        patch: Patch,
        embedding: Arc<[f32]>,
    ) -> IngestOutcome {
        let key = (label_pos, patch.id());
        match self.slots.get(&key) {
            Some(&offset) => {
                let seq = self.by_label[label_pos][offset].seq;
                self.by_label[label_pos][offset] = Arc::new(SupportEntry {
                    label: label.clone(),
                    patch,
                    embedding,
                    seq,
                });
                IngestOutcome::Replaced
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                let entries = &mut self.by_label[label_pos];
                self.slots.insert(key, entries.len());
                entries.push(Arc::new(SupportEntry {
                    label: label.clone(),
                    patch,
                    embedding,
                    seq,
                }));
                IngestOutcome::Inserted
            }
        }
    }
}

/// Labeled support patches and their embeddings.
pub struct SupportIndex {
    labels: LabelSet,
    dims: DimConfig,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for SupportIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupportIndex")
            .field("labels", &self.labels)
            .field("embedding_dim", &self.dims.embedding_dim)
            .field("entries", &self.len())
            .finish()
    }
}

impl SupportIndex {
    pub fn new(labels: LabelSet, dims: DimConfig) -> Self {
        let state = IndexState::empty(labels.len());
        Self {
            labels,
            dims,
            state: RwLock::new(state),
        }
    }

    /// The configured label set.
    pub fn all_labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn embedding_dim(&self) -> usize {
        self.dims.embedding_dim
    }

    /// Inserts or replaces the entry keyed by `(label, patch.id())`.
    pub fn ingest(
        &self,
        label: &str,
        patch: Patch,
        embedding: Vec<f32>,
    ) -> Result<IngestOutcome, IndexError> {
        let (label_pos, label) = self.resolve(label)?;
        let embedding = self.prepare(embedding)?;

        let outcome = self.state.write().apply(label_pos, &label, patch, embedding);
        debug!(label = %label, ?outcome, "Support entry ingested");
        Ok(outcome)
    }

    /// Ingests all patches of one image under a single write lock.
    ///
    /// Every embedding is validated before anything is applied, so a dimension error
    /// leaves the index untouched.
    pub fn ingest_batch(
        &self,
        label: &str,
        items: Vec<(Patch, Vec<f32>)>,
    ) -> Result<Vec<IngestOutcome>, IndexError> {
        self.commit_batch(label, items, false)
    }

    /// Swaps the whole table for `items` under one write lock.
    ///
    /// Validation happens first; on error the previous entries stay in place and
    /// readers never see an empty index in between.
    pub fn replace_all(
        &self,
        label: &str,
        items: Vec<(Patch, Vec<f32>)>,
    ) -> Result<Vec<IngestOutcome>, IndexError> {
        self.commit_batch(label, items, true)
    }

    /// All entries for `label`, in insertion order.
    pub fn entries_for(&self, label: &str) -> Result<Vec<Arc<SupportEntry>>, IndexError> {
        let (label_pos, _) = self.resolve(label)?;
        Ok(self.state.read().by_label[label_pos].clone())
    }

    pub fn count_for(&self, label: &str) -> Result<usize, IndexError> {
        let (label_pos, _) = self.resolve(label)?;
        Ok(self.state.read().by_label[label_pos].len())
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent view of every label's entries, taken under one read lock.
    pub fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read();
        IndexSnapshot {
            labels: self.labels.clone(),
            by_label: state.by_label.clone(),
        }
    }

    /// Drops every entry (explicit rebuild). Sequence numbers restart at zero.
    pub fn clear(&self) {
        *self.state.write() = IndexState::empty(self.labels.len());
        debug!("Support index cleared");
    }

    fn resolve(&self, label: &str) -> Result<(usize, ClassLabel), IndexError> {
        let label = self.labels.get(label)?.clone();
        let pos = self
            .labels
            .position(&label)
            .ok_or_else(|| IndexError::UnknownLabel {
                label: label.to_string(),
            })?;
        Ok((pos, label))
    }

    fn commit_batch(
        &self,
        label: &str,
        items: Vec<(Patch, Vec<f32>)>,
        reset: bool,
    ) -> Result<Vec<IngestOutcome>, IndexError> {
        let (label_pos, label) = self.resolve(label)?;
        let prepared = items
            .into_iter()
            .map(|(patch, embedding)| Ok((patch, self.prepare(embedding)?)))
            .collect::<Result<Vec<_>, IndexError>>()?;

        let mut state = self.state.write();
        if reset {
            *state = IndexState::empty(self.labels.len());
        }
        let outcomes = prepared
            .into_iter()
            .map(|(patch, embedding)| state.apply(label_pos, &label, patch, embedding))
            .collect();
        debug!(label = %label, reset, entries = state.len(), "Support batch committed");
        Ok(outcomes)
    }

    fn prepare(&self, mut embedding: Vec<f32>) -> Result<Arc<[f32]>, IndexError> {
        validate_embedding_dim(embedding.len(), self.dims.embedding_dim).map_err(|_| {
            IndexError::DimensionMismatch {
                expected: self.dims.embedding_dim,
                actual: embedding.len(),
            }
        })?;
        if let Some(position) = embedding.iter().position(|x| !x.is_finite()) {
            return Err(IndexError::NonFiniteEmbedding { position });
        }
        l2_normalize(&mut embedding);
        Ok(embedding.into())
    }
}

/// Point-in-time copy of the index (entries are shared, not cloned).
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    labels: LabelSet,
    by_label: Vec<Vec<Arc<SupportEntry>>>,
}

impl IndexSnapshot {
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Entries grouped in label enumeration order.
    pub fn groups(&self) -> impl Iterator<Item = (&ClassLabel, &[Arc<SupportEntry>])> {
        self.labels
            .iter()
            .zip(self.by_label.iter().map(Vec::as_slice))
    }

    pub fn len(&self) -> usize {
        self.by_label.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
