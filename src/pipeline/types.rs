use std::collections::BTreeMap;
use std::time::Duration;

use uuid::Uuid;

use crate::constants::{
    DEFAULT_EMBEDDING_TIMEOUT_MS, DEFAULT_REASONING_TIMEOUT_MS, DEFAULT_SUPPORT_PATCH_SIZE,
    DEFAULT_SUPPORT_RESOLUTION,
};

use crate::index::ClassLabel;
use crate::patch::{Patch, SourceImage};
use crate::postprocess::FlagDecision;
use crate::reasoning::SamplingParams;
use crate::retrieval::{ClassScores, EvidenceSummary};

/// Every option of one inference call. The core applies no defaults.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub query_image: SourceImage,
    pub sampling: SamplingParams,
    /// Total evidence items placed in the prompt.
    pub k: usize,
    pub max_patches_per_class: usize,
    /// Side length of the query image shown to the reasoning model.
    pub input_resolution: u32,
    /// Side length the query is resized to before cutting retrieval patches.
    pub support_resolution: u32,
    pub support_patch_size: u32,
}

#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub request_id: Uuid,
    /// Content hash of the query image, hex.
    pub image_id: String,
    pub decision: FlagDecision,
    pub explanation: String,
    pub class_scores: ClassScores,
    pub raw_response: String,
    /// `(width, height)` of the query image as received.
    pub original_size: (u32, u32),
    pub evidence: Vec<EvidenceSummary>,
    pub elapsed: Duration,
}

impl InferenceResult {
    pub fn flag(&self) -> &ClassLabel {
        self.decision.label()
    }
}

/// Outcome of [`add_support_image`](super::VisionRagService::add_support_image).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportIngest {
    pub patches: usize,
    pub inserted: usize,
    pub replaced: usize,
}

/// An embedded support image that has not been written to the index yet.
///
/// Produced by [`stage_support_image`](super::VisionRagService::stage_support_image);
/// applied with [`commit_support`](super::VisionRagService::commit_support).
#[derive(Debug, Clone)]
pub struct StagedSupport {
    pub(crate) label: ClassLabel,
    pub(crate) items: Vec<(Patch, Vec<f32>)>,
}

impl StagedSupport {
    pub fn label(&self) -> &ClassLabel {
        &self.label
    }

    pub fn patch_count(&self) -> usize {
        self.items.len()
    }
}

/// Outcome of a directory load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportLoadReport {
    /// Images ingested per label.
    pub images: BTreeMap<String, usize>,
    pub patches: usize,
    /// Files that looked like images but failed to decode or ingest.
    pub skipped: usize,
    /// Labels with no directory under the root.
    pub missing_labels: Vec<String>,
}

impl SupportLoadReport {
    pub fn total_images(&self) -> usize {
        self.images.values().sum()
    }
}

/// Per-service knobs fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceSettings {
    /// Geometry used for support images.
    pub support_resolution: u32,
    pub support_patch_size: u32,
    pub embedding_timeout: Duration,
    pub reasoning_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            support_resolution: DEFAULT_SUPPORT_RESOLUTION,
            support_patch_size: DEFAULT_SUPPORT_PATCH_SIZE,
            embedding_timeout: Duration::from_millis(DEFAULT_EMBEDDING_TIMEOUT_MS),
            reasoning_timeout: Duration::from_millis(DEFAULT_REASONING_TIMEOUT_MS),
        }
    }
}
