use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeMap;

use crate::index::{ClassLabel, SupportEntry};
use crate::patch::PatchBounds;

/// Retrieval knobs supplied per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    /// Total evidence items returned after merging classes.
    pub k: usize,
    /// Cap on each class's contribution before merging.
    pub max_patches_per_class: usize,
}

/// A support entry selected for one query, with its similarity.
#[derive(Debug, Clone)]
pub struct EvidenceItem {
    pub entry: Arc<SupportEntry>,
    /// Best cosine similarity over all query patches.
    pub similarity: f32,
    /// Row-major index of the query patch that produced `similarity`.
    pub query_patch: usize,
}

impl EvidenceItem {
    pub fn label(&self) -> &ClassLabel {
        &self.entry.label
    }

    pub fn summary(&self) -> EvidenceSummary {
        let id = self.entry.patch.id();
        EvidenceSummary {
            label: self.entry.label.clone(),
            similarity: self.similarity,
            query_patch: self.query_patch,
            source_id: format!("{:016x}", id.source_id),
            row: id.row,
            col: id.col,
            bounds: self.entry.patch.bounds(),
        }
    }
}

/// Serializable description of an evidence item (no pixels).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSummary {
    pub label: ClassLabel,
    pub similarity: f32,
    pub query_patch: usize,
    pub source_id: String,
    pub row: u32,
    pub col: u32,
    pub bounds: PatchBounds,
}

/// Mean similarity per class, in label enumeration order.
///
/// Serializes as a JSON object `{label: score}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassScores {
    scores: Vec<(ClassLabel, f32)>,
}

impl ClassScores {
    pub(crate) fn from_ordered(scores: Vec<(ClassLabel, f32)>) -> Self {
        Self { scores }
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|(l, _)| l.as_str() == label)
            .map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClassLabel, f32)> {
        self.scores.iter().map(|(l, s)| (l, *s))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Highest-scoring label; ties go to the label enumerated first.
    pub fn best(&self) -> Option<&ClassLabel> {
        let mut best: Option<(&ClassLabel, f32)> = None;
        for (label, score) in &self.scores {
            match best {
                Some((_, top)) if *score <= top => {}
                _ => best = Some((label, *score)),
            }
        }
        best.map(|(l, _)| l)
    }
}

impl Serialize for ClassScores {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scores.len()))?;
        for (label, score) in &self.scores {
            map.serialize_entry(label.as_str(), score)?;
        }
        map.end()
    }
}

/// Output of one retrieval pass.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    /// Evidence in rank order (similarity desc, insertion order on ties), at most `k`.
    pub evidence: Vec<EvidenceItem>,
    /// Per-class means over the capped, pre-truncation subsets.
    pub class_scores: ClassScores,
    /// Size of the merged candidate set before truncation to `k`.
    pub merged_candidates: usize,
}
