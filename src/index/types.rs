use std::sync::Arc;

use serde::Serialize;

use super::error::IndexError;
use crate::patch::Patch;

/// One class of the classification problem, e.g. `dirty`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClassLabel(String);

impl ClassLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClassLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The ordered, immutable set of class labels.
///
/// Order is the enumeration order used for prompt grouping and score tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Arc<[ClassLabel]>,
}

impl LabelSet {
    /// Builds a set from raw names (trimmed). Rejects empty sets, blank names and duplicates.
    pub fn new<I, S>(names: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<ClassLabel> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(IndexError::InvalidLabelSet {
                    reason: "blank class label".to_string(),
                });
            }
            if labels.iter().any(|l| l.as_str() == name) {
                return Err(IndexError::InvalidLabelSet {
                    reason: format!("duplicate class label '{}'", name),
                });
            }
            labels.push(ClassLabel(name.to_string()));
        }

        if labels.is_empty() {
            return Err(IndexError::InvalidLabelSet {
                reason: "at least one class label is required".to_string(),
            });
        }

        Ok(Self {
            labels: labels.into(),
        })
    }

    /// Returns the label named `name` (exact match after trimming).
    pub fn get(&self, name: &str) -> Result<&ClassLabel, IndexError> {
        let name = name.trim();
        self.labels
            .iter()
            .find(|l| l.as_str() == name)
            .ok_or_else(|| IndexError::UnknownLabel {
                label: name.to_string(),
            })
    }

    /// The first label in enumeration order. Sets are never empty.
    pub fn first(&self) -> &ClassLabel {
        &self.labels[0]
    }

    /// Enumeration position of `label`.
    pub fn position(&self, label: &ClassLabel) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassLabel> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[ClassLabel] {
        &self.labels
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a ClassLabel;
    type IntoIter = std::slice::Iter<'a, ClassLabel>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

/// A labeled, embedded support patch. Immutable once stored.
#[derive(Debug, Clone)]
pub struct SupportEntry {
    pub label: ClassLabel,
    pub patch: Patch,
    /// Unit-length copy of the ingested embedding.
    pub embedding: Arc<[f32]>,
    /// Global insertion sequence; the deterministic tie-breaker in retrieval.
    pub seq: u64,
}

/// Result of a single [`ingest`](super::SupportIndex::ingest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    /// The (label, patch) key existed; its embedding was replaced in place.
    Replaced,
}
